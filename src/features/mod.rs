//! The keyword feature contract and the matcher that drives it.
//!
//! A feature describes itself with a [`KeywordSpec`]; the registry compiles
//! one pattern per feature and the matcher walks the query string with it:
//!
//! ```text
//! "some words incategory:\"Musical groups\" more"
//!             └────────┬────────────────────┘
//!                      match
//!   key     = incategory          (negation already stripped)
//!   value   = Musical groups      (unescaped)
//!   quoted  = "Musical groups"    (verbatim, for keep-text re-insertion)
//! ```
//!
//! Parsing and applying are separate steps. [`KeywordFeature::parse_value`]
//! interprets the matched text alone and may only emit warnings;
//! [`KeywordFeature::apply`] sees the compilation context and produces the
//! filter. The matcher owns negation: features never see the leading `-`,
//! they receive `negated` and the returned filter is routed into the must or
//! must-not list accordingly.

use std::collections::HashMap;

use bitflags::bitflags;
use regex::Regex;

use crate::context::{CompilationContext, WarningCollector};
use crate::error::RegistryError;
use crate::extract::{extract_to_string, MatchView, Replacement};
use crate::query::Query;

pub mod boost;
pub mod daterange;
pub mod deepcat;
pub mod exact;
pub mod geo;
pub mod greedy;
pub mod misc;
pub mod numeric;
pub mod regex_kw;

bitflags! {
    /// Value delimiter styles a keyword accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ValueDelimiters: u8 {
        /// An unquoted token, up to the next whitespace or quote.
        const BARE = 1;
        /// A double-quoted phrase with `\"` escapes.
        const QUOTED = 1 << 1;
        /// A `/pattern/` body with an optional `i` suffix.
        const REGEX = 1 << 2;
    }
}

/// Which delimiter style actually surrounded one matched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Bare,
    Quoted,
    Regex,
}

/// Static description of one keyword feature.
#[derive(Debug, Clone)]
pub struct KeywordSpec {
    /// Feature name used in registry diagnostics.
    pub name: &'static str,
    /// Keyword aliases, matched case-sensitively before the `:`.
    pub keywords: &'static [&'static str],
    pub has_value: bool,
    /// When set the value may be empty and no whitespace is skipped after
    /// the `:`, so `prefer-recent: x` leaves `x` as ordinary text.
    pub allow_empty_value: bool,
    /// Only matches at the head of the query string.
    pub query_header: bool,
    /// Consumes everything to the end of the string as the value.
    pub greedy: bool,
    pub delimiters: ValueDelimiters,
}

impl KeywordSpec {
    /// The common shape: one mandatory value, bare or quoted, anywhere in
    /// the query.
    pub fn simple(name: &'static str, keywords: &'static [&'static str]) -> KeywordSpec {
        KeywordSpec {
            name,
            keywords,
            has_value: true,
            allow_empty_value: false,
            query_header: false,
            greedy: false,
            delimiters: ValueDelimiters::BARE | ValueDelimiters::QUOTED,
        }
    }
}

/// One successfully parsed keyword value. Which variant a feature produces
/// is fixed per feature; the matcher treats the value as opaque.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Categories(exact::CategoryValue),
    Templates(Vec<String>),
    Terms(Vec<String>),
    FileTypes(exact::FileTypeValue),
    PageIds(Vec<u64>),
    TextFilter { text: String, phrase: bool },
    DeepCategory(String),
    Source(regex_kw::SourceValue),
    Geo(geo::GeoValue),
    Date(daterange::DateRangeValue),
    Numeric(numeric::NumericValue),
    BoostTemplates(Vec<boost::TemplateBoost>),
    PreferRecent { decay: Option<f64>, half_life_days: Option<f64> },
    Titles(Vec<String>),
    Prefix(greedy::PrefixValue),
    Text(String),
    Empty,
}

/// A single keyword feature.
///
/// `parse_value` is pure with respect to the compilation: it sees only the
/// matched text and a warning sink, and returns `None` to reject the value.
/// `apply` runs once per match with the parse result (`None` when parsing
/// rejected) and returns the filter to route plus whether the matched text
/// stays in the query for scoring.
pub trait KeywordFeature {
    fn spec(&self) -> &KeywordSpec;

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        quoted_value: &str,
        delimiter: Delimiter,
        suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue>;

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        negated: bool,
    ) -> (Option<Query>, bool);

    /// Tag recorded in `syntax_used` for a match of this feature.
    fn syntax_tag(&self, key: &str, delimiter: Delimiter) -> String {
        let _ = delimiter;
        key.to_string()
    }
}

/// A feature plus its pattern, compiled once at registry construction.
pub(crate) struct CompiledFeature {
    feature: Box<dyn KeywordFeature>,
    pattern: Regex,
}

impl CompiledFeature {
    /// Strip every match of this feature from `term`, mutating the context,
    /// and return the remaining text.
    pub(crate) fn strip(&self, ctx: &mut CompilationContext<'_>, term: &str) -> String {
        let spec = self.feature.spec();
        extract_to_string(term, &self.pattern, |m| {
            if !spec.query_header && !m.at_word_start() {
                return Replacement::Reject;
            }
            self.handle_match(ctx, m)
        })
    }

    fn handle_match(&self, ctx: &mut CompilationContext<'_>, m: &MatchView<'_>) -> Replacement {
        let raw_key = m.group("key").unwrap_or("");
        let (negated, key) = match raw_key.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, raw_key),
        };

        let quoted_value = m.group("value").unwrap_or("");
        let (delimiter, value, suffix) = if let Some(pattern) = m.group("rpattern") {
            (Delimiter::Regex, pattern.to_string(), m.group("rsuffix").unwrap_or("").to_string())
        } else if let Some(quoted) = m.group("quoted") {
            (Delimiter::Quoted, quoted.replace("\\\"", "\""), String::new())
        } else {
            (Delimiter::Bare, quoted_value.to_string(), String::new())
        };

        ctx.add_syntax_used(&self.feature.syntax_tag(key, delimiter));
        let parsed = self.feature.parse_value(key, &value, quoted_value, delimiter, &suffix, ctx);
        let (filter, keep_text) = self.feature.apply(ctx, key, parsed.as_ref(), negated);
        if let Some(filter) = filter {
            if negated {
                ctx.add_not_filter(filter);
            } else {
                ctx.add_filter(filter);
            }
        }
        if keep_text {
            Replacement::Raw(format!("{quoted_value} "))
        } else {
            Replacement::Drop
        }
    }

    pub(crate) fn is_greedy(&self) -> bool {
        self.feature.spec().greedy
    }
}

/// The validated, pattern-compiled feature list. Greedy features sort to the
/// front and run before everything else; within each group registration
/// order is preserved.
pub struct FeatureRegistry {
    features: Vec<CompiledFeature>,
}

impl FeatureRegistry {
    pub fn new(features: Vec<Box<dyn KeywordFeature>>) -> Result<FeatureRegistry, RegistryError> {
        let mut seen: HashMap<&'static str, &'static str> = HashMap::new();
        let mut compiled = Vec::with_capacity(features.len());
        for feature in features {
            let spec = feature.spec();
            validate_spec(spec)?;
            for &keyword in spec.keywords {
                if let Some(&first) = seen.get(keyword) {
                    return Err(RegistryError::DuplicateKeyword {
                        keyword: keyword.to_string(),
                        first,
                        second: spec.name,
                    });
                }
                seen.insert(keyword, spec.name);
            }
            let source = build_pattern(spec);
            let pattern = Regex::new(&source).map_err(|e| RegistryError::InvalidSpec {
                feature: spec.name,
                reason: format!("keyword pattern failed to compile: {e}"),
            })?;
            compiled.push(CompiledFeature { feature, pattern });
        }
        compiled.sort_by_key(|f| !f.is_greedy());
        Ok(FeatureRegistry { features: compiled })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CompiledFeature> {
        self.features.iter()
    }
}

/// Shared handling for a failed collaborator lookup: a missing entity is
/// dropped silently, an unavailable collaborator degrades with a warning.
pub(crate) fn resolver_miss(ctx: &mut CompilationContext<'_>, err: crate::error::ResolveError) {
    match err {
        crate::error::ResolveError::NotFound(_) => {}
        crate::error::ResolveError::Unavailable(what) => {
            tracing::warn!(%what, "title resolver unavailable");
            ctx.add_warning("resolver-unavailable", &[]);
        }
    }
}

fn validate_spec(spec: &KeywordSpec) -> Result<(), RegistryError> {
    if spec.keywords.is_empty() {
        return Err(RegistryError::InvalidSpec {
            feature: spec.name,
            reason: "no keywords declared".to_string(),
        });
    }
    if spec.greedy && !spec.has_value {
        return Err(RegistryError::InvalidSpec {
            feature: spec.name,
            reason: "greedy keywords must take a value".to_string(),
        });
    }
    if spec.has_value && !spec.greedy && spec.delimiters.is_empty() {
        return Err(RegistryError::InvalidSpec {
            feature: spec.name,
            reason: "valued keywords must accept at least one delimiter".to_string(),
        });
    }
    Ok(())
}

/// Compose the match pattern for one spec. The value side is an ordered
/// alternation; the regex form comes first so `/x/i` is not swallowed by the
/// bare-token branch.
fn build_pattern(spec: &KeywordSpec) -> String {
    let keywords =
        spec.keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
    let mut pattern = String::new();
    if spec.query_header {
        pattern.push_str(r"^\s*");
    }
    pattern.push_str("(?P<key>-?(?:");
    pattern.push_str(&keywords);
    pattern.push_str(")):");
    if !spec.has_value {
        pattern.push_str(r"\s?");
        return pattern;
    }
    if spec.greedy {
        pattern.push_str(r"\s*(?P<value>.*)$");
        return pattern;
    }
    if !spec.allow_empty_value {
        pattern.push_str(r"\s*");
    }
    let mut alternatives = Vec::new();
    if spec.delimiters.contains(ValueDelimiters::REGEX) {
        alternatives.push(r"/(?P<rpattern>(?:\\.|[^\\/])*)/(?P<rsuffix>i?)");
    }
    if spec.delimiters.contains(ValueDelimiters::QUOTED) {
        alternatives.push(r#""(?P<quoted>(?:\\"|[^"])*)""#);
    }
    if spec.delimiters.contains(ValueDelimiters::BARE) {
        alternatives.push(if spec.allow_empty_value {
            r#"(?P<bare>[^"\s]*)"#
        } else {
            r#"(?P<bare>[^"\s]+)"#
        });
    }
    pattern.push_str("(?P<value>");
    pattern.push_str(&alternatives.join("|"));
    pattern.push_str(r")\s?");
    pattern
}
