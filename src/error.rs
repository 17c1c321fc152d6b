//! Error types.
//!
//! Two very different failure classes live here:
//!
//! - [`RegistryError`]: programmer errors in the feature configuration,
//!   detected eagerly when the compiler is constructed. These are the only
//!   hard failures the crate produces.
//! - [`ResolveError`]: failures of out-of-process collaborators (title
//!   resolution, category graph). These never abort a compilation; the
//!   feature that hit them records a warning and contributes no filter.

use thiserror::Error;

/// Construction-time failure while building the keyword feature registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two features registered the same keyword name. Keyword names are
    /// case-sensitive and must be unique within one pipeline instance.
    #[error("keyword `{keyword}` registered by both `{first}` and `{second}`")]
    DuplicateKeyword { keyword: String, first: &'static str, second: &'static str },

    /// A feature declared an impossible combination of capabilities,
    /// e.g. greedy without a value, or a keyword pattern that does not
    /// compile.
    #[error("feature `{feature}` has an invalid spec: {reason}")]
    InvalidSpec { feature: &'static str, reason: String },
}

/// Failure of an external collaborator call.
///
/// Timeout ownership lives with the collaborator; from the compiler's point
/// of view every failure mode collapses to "the fact could not be resolved".
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}
