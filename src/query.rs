//! Backend-agnostic structured queries.
//!
//! The compiler's output is a tree of these values; they serialize to a
//! stable JSON shape a search backend adapter can translate into its native
//! request format. Nothing in here executes anything.
//!
//! Field references use the `name^weight` convention (`"title.plain^20"`),
//! matching the weighted-field lists the full-text assembler produces.

use serde::Serialize;

/// A structured query clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Matches every document; used as the highlight query when the search
    /// is filter-only or exclusive.
    MatchAll,
    /// Matches nothing; the terminal query of an impossible search.
    MatchNone,
    /// The backend's full query-string syntax over weighted fields.
    QueryString(QueryStringQuery),
    /// Degraded rebuild: boolean AND/OR only, no fuzzy/wildcard/proximity.
    SimpleQueryString { query: String, fields: Vec<String>, default_operator: String, flags: String },
    /// One literal string matched across several weighted fields.
    MultiMatch { query: String, fields: Vec<String> },
    /// Analyzed match against a single field.
    Match { field: String, query: String },
    /// Exact-order phrase match against a single analyzed field.
    MatchPhrase { field: String, query: String },
    /// Phrase-prefix match against a single (plain) field.
    MatchPhrasePrefix { field: String, query: String },
    /// Exact term filter.
    Term { field: String, value: String },
    /// Field presence filter.
    Exists { field: String },
    /// Restricts hits to an explicit page id list.
    Ids { values: Vec<u64> },
    Bool(BoolQuery),
    Range { field: String, params: RangeParams },
    /// Wraps a query targeting a nested document path.
    Nested { path: String, query: Box<Query> },
    GeoDistance { field: String, lat: f64, lon: f64, distance: String },
    /// Trigram-index accelerated regular expression over a source field.
    SourceRegex(SourceRegexQuery),
    /// Similarity query seeded from one or more existing pages.
    MoreLikeThis { fields: Vec<String>, like: Vec<String>, exclude_page_ids: Vec<u64> },
    /// Routes between queries on the analyzed token count of `text`; falls
    /// back when no condition matches.
    TokenCountRouter {
        text: String,
        field: String,
        fallback: Box<Query>,
        conditions: Vec<TokenCountCondition>,
    },
}

/// One branch of a [`Query::TokenCountRouter`]: taken when the token count
/// exceeds `gt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCountCondition {
    pub gt: u32,
    pub query: Query,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Query>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStringQuery {
    pub query: String,
    pub fields: Vec<String>,
    pub phrase_slop: u32,
    pub default_operator: String,
    pub allow_leading_wildcard: bool,
    pub fuzzy_prefix_length: u32,
    pub rewrite: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_determinized_states: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRegexQuery {
    pub pattern: String,
    pub field: String,
    /// The ngram index consulted to pre-filter candidate documents.
    pub ngram_field: String,
    pub case_sensitive: bool,
    pub locale: String,
    pub max_determinized_states: u32,
}

/// Bound of a range query: backend date-math strings or plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RangeValue {
    Str(String),
    Num(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<RangeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<RangeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<RangeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<RangeValue>,
    /// Precision format of the supplied date bounds, e.g. `year_month`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// A geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Query {
    /// OR several clauses together. A single clause is returned unwrapped;
    /// several become a bool query requiring at least one match.
    pub fn bool_or(mut queries: Vec<Query>) -> Query {
        match queries.len() {
            0 => Query::MatchNone,
            1 => queries.remove(0),
            _ => Query::Bool(BoolQuery {
                should: queries,
                minimum_should_match: Some(1),
                ..BoolQuery::default()
            }),
        }
    }

    /// Analyzed single-field match, the building block of most filters.
    pub fn match_field(field: &str, value: impl Into<String>) -> Query {
        Query::Match { field: field.to_string(), query: value.into() }
    }

    /// Exact term filter.
    pub fn term(field: &str, value: impl Into<String>) -> Query {
        Query::Term { field: field.to_string(), value: value.into() }
    }
}

/// Format a weighted field reference, trimming a trailing `.0` so weights
/// serialize the same way regardless of float formatting.
pub fn weighted_field(name: &str, weight: f64) -> String {
    let rounded = (weight * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{name}^{}", rounded as i64)
    } else {
        format!("{name}^{rounded}")
    }
}
