//! Compile free-text search queries with embedded keyword directives
//! (`incategory:Foo`, `insource:/regex/`, quoted phrases, wildcards) into
//! structured, backend-agnostic search requests: boolean filters, a
//! weighted full-text query, a highlight query and an optional
//! phrase-proximity rescore.

#[macro_use]
mod macros;

mod compiler;
mod config;
mod context;
mod error;
mod escape;
mod extract;
mod fulltext;
mod nearmatch;
mod prefix;
mod query;
mod resolve;

pub mod features;

pub use compiler::{CompiledRequest, QueryCompiler, Rescore};
pub use config::{
    FieldWeights, PhraseSlop, PrefixWeights, RequestParams, SearchConfig, FILE_NAMESPACE,
};
pub use context::{
    CompilationContext, GeoBoost, HighlightConfig, PreferRecent, Warning, WarningCollector,
};
pub use error::{RegistryError, ResolveError};
pub use escape::{
    balance_quotes, escape_part, fixup_dangling_operators, fixup_whole, is_valid_fuzziness,
};
pub use extract::{extract, extract_to_string, rescan_raw, MatchView, Replacement, Segment};
pub use features::{
    Delimiter, FeatureRegistry, KeywordFeature, KeywordSpec, ParsedValue, ValueDelimiters,
};
pub use nearmatch::near_match_query;
pub use prefix::{prefix_search, PrefixSearch};
pub use query::{
    weighted_field, BoolQuery, Coord, Query, QueryStringQuery, RangeParams, RangeValue,
    SourceRegexQuery, TokenCountCondition,
};
pub use resolve::{CategoryGraph, NoopResolver, ResolvedTitle, TitleResolver};
