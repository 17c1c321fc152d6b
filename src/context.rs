//! Per-query mutable compilation state.
//!
//! One [`CompilationContext`] is created per incoming query string, mutated
//! by each keyword feature in registered order, handed to the full-text
//! assembler for one final pass, then consumed into a `CompiledRequest`.
//! Nothing in it is shared across queries.
//!
//! Two invariants hold for the whole pipeline:
//!
//! 1. Once `results_possible` goes false it stays false. Later stages
//!    short-circuit expensive work but never error; compilation always
//!    completes and yields a (match-nothing) request.
//! 2. Filter and warning lists are append-only. Features interact only
//!    additively; none may remove another's contribution.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::SearchConfig;
use crate::query::{Coord, Query};

/// A user-facing warning: a stable code plus parameters, localized by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: &'static str,
    pub params: Vec<String>,
}

/// Sink for warnings produced while parsing keyword values. Implemented by
/// [`CompilationContext`] and, for isolated parse tests, by `Vec<Warning>`.
pub trait WarningCollector {
    fn add_warning(&mut self, code: &'static str, params: &[&str]);
}

impl WarningCollector for Vec<Warning> {
    fn add_warning(&mut self, code: &'static str, params: &[&str]) {
        self.push(Warning { code, params: params.iter().map(|p| p.to_string()).collect() });
    }
}

/// Highlight configuration registered for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HighlightConfig {
    /// Re-run this query against the field to find highlight spans.
    Query { query: Query },
    /// Re-run a regular expression for highlighting only.
    Regex { pattern: String, locale: String, insensitive: bool },
}

/// A scored geographic proximity boost (never a hard filter).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoBoost {
    pub coord: Coord,
    pub radius_meters: u32,
    pub weight: f64,
}

/// Recency preference recorded by `prefer-recent:`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreferRecent {
    /// Portion of the score affected, in `[0, 1]`.
    pub decay: f64,
    /// Days for that portion to halve.
    pub half_life_days: f64,
}

/// The accumulator threaded through the whole pipeline.
#[derive(Debug)]
pub struct CompilationContext<'a> {
    config: &'a SearchConfig,
    namespaces: Option<Vec<u32>>,
    filters: Vec<Query>,
    not_filters: Vec<Query>,
    non_text_queries: Vec<Query>,
    non_text_highlight_queries: Vec<Query>,
    main_query: Option<Query>,
    highlight_query: Option<Query>,
    phrase_rescore_query: Option<Query>,
    results_possible: bool,
    syntax_used: BTreeSet<String>,
    highlight_fields: BTreeMap<String, HighlightConfig>,
    warnings: Vec<Warning>,
    suggest_prefixes: Vec<String>,
    prefer_recent: Option<PreferRecent>,
    boost_templates: BTreeMap<String, f64>,
    geo_boosts: Vec<GeoBoost>,
    local_only: bool,
    cleaned_term: String,
}

impl<'a> CompilationContext<'a> {
    pub fn new(config: &'a SearchConfig, namespaces: Option<Vec<u32>>) -> Self {
        CompilationContext {
            config,
            namespaces,
            filters: Vec::new(),
            not_filters: Vec::new(),
            non_text_queries: Vec::new(),
            non_text_highlight_queries: Vec::new(),
            main_query: None,
            highlight_query: None,
            phrase_rescore_query: None,
            results_possible: true,
            syntax_used: BTreeSet::new(),
            highlight_fields: BTreeMap::new(),
            warnings: Vec::new(),
            suggest_prefixes: Vec::new(),
            prefer_recent: None,
            boost_templates: BTreeMap::new(),
            geo_boosts: Vec::new(),
            local_only: false,
            cleaned_term: String::new(),
        }
    }

    pub fn config(&self) -> &'a SearchConfig {
        self.config
    }

    pub fn namespaces(&self) -> Option<&[u32]> {
        self.namespaces.as_deref()
    }

    pub fn set_namespaces(&mut self, namespaces: Option<Vec<u32>>) {
        self.namespaces = namespaces;
    }

    /// Append a must filter.
    pub fn add_filter(&mut self, filter: Query) {
        self.filters.push(filter);
    }

    /// Append a must-not filter.
    pub fn add_not_filter(&mut self, filter: Query) {
        self.not_filters.push(filter);
    }

    /// Append a structural (non-text) query ANDed with the main query.
    pub fn add_non_text_query(&mut self, query: Query) {
        self.non_text_queries.push(query);
    }

    pub fn add_non_text_highlight_query(&mut self, query: Query) {
        self.non_text_highlight_queries.push(query);
    }

    pub fn set_main_query(&mut self, query: Query) {
        self.main_query = Some(query);
    }

    pub fn main_query(&self) -> Option<&Query> {
        self.main_query.as_ref()
    }

    pub fn set_highlight_query(&mut self, query: Query) {
        self.highlight_query = Some(query);
    }

    pub fn set_phrase_rescore_query(&mut self, query: Query) {
        self.phrase_rescore_query = Some(query);
    }

    /// Mark the query as unable to yield results. Sticky: there is no way
    /// back to `true`.
    pub fn disable_results(&mut self) {
        self.results_possible = false;
    }

    pub fn results_possible(&self) -> bool {
        self.results_possible
    }

    pub fn add_syntax_used(&mut self, tag: &str) {
        self.syntax_used.insert(tag.to_string());
    }

    pub fn is_syntax_used(&self, tag: &str) -> bool {
        self.syntax_used.contains(tag)
    }

    pub fn add_highlight_field(&mut self, field: &str, config: HighlightConfig) {
        self.highlight_fields.insert(field.to_string(), config);
    }

    /// Record text removed from the query so suggestion reuse can put it
    /// back in front of corrected queries.
    pub fn add_suggest_prefix(&mut self, prefix: &str) {
        self.suggest_prefixes.push(prefix.to_string());
    }

    pub fn set_prefer_recent(&mut self, options: PreferRecent) {
        self.prefer_recent = Some(options);
    }

    pub fn set_boost_templates(&mut self, boosts: BTreeMap<String, f64>) {
        self.boost_templates = boosts;
    }

    pub fn add_geo_boost(&mut self, boost: GeoBoost) {
        self.geo_boosts.push(boost);
    }

    pub fn set_local_only(&mut self, local: bool) {
        self.local_only = local;
    }

    pub fn local_only(&self) -> bool {
        self.local_only
    }

    pub fn set_cleaned_term(&mut self, term: &str) {
        self.cleaned_term = term.to_string();
    }

    pub fn cleaned_term(&self) -> &str {
        &self.cleaned_term
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn into_parts(self) -> ContextParts {
        ContextParts {
            filters: self.filters,
            not_filters: self.not_filters,
            non_text_queries: self.non_text_queries,
            non_text_highlight_queries: self.non_text_highlight_queries,
            main_query: self.main_query,
            highlight_query: self.highlight_query,
            phrase_rescore_query: self.phrase_rescore_query,
            results_possible: self.results_possible,
            syntax_used: self.syntax_used,
            highlight_fields: self.highlight_fields,
            warnings: self.warnings,
            suggest_prefixes: self.suggest_prefixes,
            prefer_recent: self.prefer_recent,
            boost_templates: self.boost_templates,
            geo_boosts: self.geo_boosts,
            local_only: self.local_only,
            namespaces: self.namespaces,
            cleaned_term: self.cleaned_term,
        }
    }
}

impl WarningCollector for CompilationContext<'_> {
    fn add_warning(&mut self, code: &'static str, params: &[&str]) {
        self.warnings.push(Warning { code, params: params.iter().map(|p| p.to_string()).collect() });
    }
}

/// Everything the finalize step needs, pulled out of the context by value.
pub(crate) struct ContextParts {
    pub filters: Vec<Query>,
    pub not_filters: Vec<Query>,
    pub non_text_queries: Vec<Query>,
    pub non_text_highlight_queries: Vec<Query>,
    pub main_query: Option<Query>,
    pub highlight_query: Option<Query>,
    pub phrase_rescore_query: Option<Query>,
    pub results_possible: bool,
    pub syntax_used: BTreeSet<String>,
    pub highlight_fields: BTreeMap<String, HighlightConfig>,
    pub warnings: Vec<Warning>,
    pub suggest_prefixes: Vec<String>,
    pub prefer_recent: Option<PreferRecent>,
    pub boost_templates: BTreeMap<String, f64>,
    pub geo_boosts: Vec<GeoBoost>,
    pub local_only: bool,
    pub namespaces: Option<Vec<u32>>,
    pub cleaned_term: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_possible_is_sticky() {
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        assert!(ctx.results_possible());
        ctx.disable_results();
        assert!(!ctx.results_possible());
    }

    #[test]
    fn warnings_accumulate_in_order() {
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        ctx.add_warning("first", &["a"]);
        ctx.add_warning("second", &[]);
        assert_eq!(ctx.warnings()[0].code, "first");
        assert_eq!(ctx.warnings()[0].params, vec!["a"]);
        assert_eq!(ctx.warnings()[1].code, "second");
    }

    #[test]
    fn syntax_used_is_a_set() {
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        ctx.add_syntax_used("incategory");
        ctx.add_syntax_used("incategory");
        assert!(ctx.is_syntax_used("incategory"));
        assert!(!ctx.is_syntax_used("hastemplate"));
    }
}
