//! Near-match assembler.
//!
//! The near match is a title-oriented exact/near-exact fallback scored
//! independently of the main text query. It runs against the combined
//! near-match field and its accent-folded variant at three-quarters of the
//! weight.

use crate::config::SearchConfig;
use crate::query::{weighted_field, Query};

pub const ALL_NEAR_MATCH: &str = "all_near_match";

/// Build the near-match query for a literal text. Whitespace-only input
/// yields a match-none so the caller can blend it in unconditionally.
pub fn near_match_query(config: &SearchConfig, text: &str) -> Query {
    if text.trim().is_empty() {
        return Query::MatchNone;
    }
    let weight = config.near_match_weight;
    Query::MultiMatch {
        query: text.to_string(),
        fields: vec![
            weighted_field(ALL_NEAR_MATCH, weight),
            weighted_field(&format!("{ALL_NEAR_MATCH}.asciifolding"), weight * 0.75),
        ],
    }
}
