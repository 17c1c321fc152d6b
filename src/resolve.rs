//! Collaborator traits for facts that live outside the query string.
//!
//! Both are synchronous and fallible. A failure never aborts a compilation:
//! the calling feature records a warning (or silently skips a single value)
//! and contributes no filter. Timeouts are the implementor's problem; by the
//! time a call returns here it either produced a fact or it did not.

use crate::error::ResolveError;
use crate::query::Coord;

/// A page title resolved to its canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTitle {
    /// Canonical title text, in display form (spaces, not underscores).
    pub title: String,
    pub page_id: u64,
    /// Primary coordinates, when the page has any.
    pub coord: Option<Coord>,
}

/// Resolves titles and page ids against the wiki.
pub trait TitleResolver {
    fn resolve_title(&self, title: &str) -> Result<ResolvedTitle, ResolveError>;
    fn resolve_page_id(&self, page_id: u64) -> Result<ResolvedTitle, ResolveError>;
}

/// Expands a category to its transitive subcategories.
pub trait CategoryGraph {
    /// Walk down from `root` at most `max_depth` levels, returning at most
    /// `limit + 1` category names including the root itself. Returning more
    /// than `limit` names signals the expansion was truncated.
    fn subcategories(
        &self,
        root: &str,
        max_depth: u32,
        limit: usize,
    ) -> Result<Vec<String>, ResolveError>;
}

/// Resolver that knows nothing. For callers without a wiki and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl TitleResolver for NoopResolver {
    fn resolve_title(&self, title: &str) -> Result<ResolvedTitle, ResolveError> {
        Err(ResolveError::NotFound(title.to_string()))
    }

    fn resolve_page_id(&self, page_id: u64) -> Result<ResolvedTitle, ResolveError> {
        Err(ResolveError::NotFound(page_id.to_string()))
    }
}

impl CategoryGraph for NoopResolver {
    fn subcategories(
        &self,
        root: &str,
        _max_depth: u32,
        _limit: usize,
    ) -> Result<Vec<String>, ResolveError> {
        Ok(vec![root.to_string()])
    }
}
