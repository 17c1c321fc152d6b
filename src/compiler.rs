//! The compiler facade: one query string in, one structured request out.
//!
//! Compilation is a fixed pipeline. Keyword features strip their matches
//! from the text in registry order (greedy features first); whatever text
//! survives goes through the full-text assembler; the accumulated context
//! is then folded into a [`CompiledRequest`].
//!
//! Compilation never fails. Bad input degrades into warnings, dropped
//! values or a match-nothing request; the only fallible step is registry
//! construction, which catches configuration mistakes eagerly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{RequestParams, SearchConfig};
use crate::context::{
    CompilationContext, GeoBoost, HighlightConfig, PreferRecent, Warning,
};
use crate::error::RegistryError;
use crate::features::boost::{BoostTemplatesFeature, PreferRecentFeature};
use crate::features::daterange::DateRangeFeature;
use crate::features::deepcat::DeepCategoryFeature;
use crate::features::exact::{
    FileTypeFeature, HasTemplateFeature, InCategoryFeature, LinksToFeature, PageIdFeature,
    TermFilterFeature, TextFieldFilterFeature,
};
use crate::features::geo::GeoFeature;
use crate::features::greedy::{MoreLikeFeature, PrefixFeature};
use crate::features::misc::{LocalFeature, SubPageOfFeature};
use crate::features::numeric::FileNumericFeature;
use crate::features::regex_kw::SourceSearchFeature;
use crate::features::{FeatureRegistry, KeywordFeature};
use crate::fulltext;
use crate::query::{BoolQuery, Query};
use crate::resolve::{CategoryGraph, TitleResolver};

/// A phrase-proximity rescore applied to the top hits of the main query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rescore {
    pub query: Query,
    /// Hits per shard the rescore is applied to.
    pub window_size: u32,
    pub weight: f64,
}

/// The compiler's output: everything a backend adapter needs to run the
/// search and present results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledRequest {
    /// The scored text query. [`Query::MatchAll`] for filter-only searches,
    /// [`Query::MatchNone`] when the query cannot match anything.
    pub main_query: Query,
    pub filters: Vec<Query>,
    pub not_filters: Vec<Query>,
    /// Structural queries ANDed with the main query but scored with it,
    /// e.g. a phrase-prefix match.
    pub non_text_queries: Vec<Query>,
    pub highlight_query: Option<Query>,
    pub phrase_rescore: Option<Rescore>,
    pub highlight_fields: BTreeMap<String, HighlightConfig>,
    pub namespaces: Option<Vec<u32>>,
    pub offset: usize,
    pub limit: usize,
    /// Text stripped during parsing that must be prepended to any suggested
    /// replacement query.
    pub suggest_prefixes: Vec<String>,
    pub syntax_used: BTreeSet<String>,
    pub warnings: Vec<Warning>,
    pub results_possible: bool,
    /// The escaped query-string text the main query was built from; input
    /// to the degraded rebuild.
    pub cleaned_term: String,
    pub prefer_recent: Option<PreferRecent>,
    pub boost_templates: BTreeMap<String, f64>,
    pub geo_boosts: Vec<GeoBoost>,
    pub local_only: bool,
}

impl CompiledRequest {
    /// Fold the main query, structural queries and filters into one
    /// executable query tree.
    pub fn query(&self) -> Query {
        let no_extras = self.non_text_queries.is_empty()
            && self.filters.is_empty()
            && self.not_filters.is_empty();
        if no_extras {
            return self.main_query.clone();
        }
        let mut must = Vec::new();
        // a bare match-all adds nothing next to real filters
        if self.main_query != Query::MatchAll {
            must.push(self.main_query.clone());
        }
        must.extend(self.non_text_queries.iter().cloned());
        Query::Bool(BoolQuery {
            must,
            must_not: self.not_filters.clone(),
            filter: self.filters.clone(),
            ..BoolQuery::default()
        })
    }
}

/// A configured, reusable query compiler. Construction validates the
/// feature registry; after that every call is infallible and the compiler
/// can be shared freely.
pub struct QueryCompiler {
    config: SearchConfig,
    registry: FeatureRegistry,
}

impl QueryCompiler {
    pub fn new(
        config: SearchConfig,
        features: Vec<Box<dyn KeywordFeature>>,
    ) -> Result<QueryCompiler, RegistryError> {
        let registry = FeatureRegistry::new(features)?;
        Ok(QueryCompiler { config, registry })
    }

    /// The full stock feature set, wired to the given collaborators.
    pub fn with_default_features(
        config: SearchConfig,
        resolver: Arc<dyn TitleResolver>,
        graph: Arc<dyn CategoryGraph>,
    ) -> Result<QueryCompiler, RegistryError> {
        let max = config.max_keyword_conditions;
        let features: Vec<Box<dyn KeywordFeature>> = vec![
            Box::new(MoreLikeFeature::more_like(Arc::clone(&resolver))),
            Box::new(MoreLikeFeature::more_like_with_wikibase(Arc::clone(&resolver))),
            Box::new(PrefixFeature::new()),
            Box::new(LocalFeature::new()),
            Box::new(PreferRecentFeature::new()),
            Box::new(InCategoryFeature::new(max, Arc::clone(&resolver))),
            Box::new(DeepCategoryFeature::new(
                config.deepcat_max_depth,
                config.deepcat_max_categories,
                graph,
            )),
            Box::new(HasTemplateFeature::new(max)),
            Box::new(LinksToFeature::new()),
            Box::new(TermFilterFeature::in_language(max)),
            Box::new(TermFilterFeature::content_model(max)),
            Box::new(FileTypeFeature::new(max, config.filetype_aliases.clone())),
            Box::new(TextFieldFilterFeature::file_mime()),
            Box::new(PageIdFeature::new(max)),
            Box::new(SourceSearchFeature::in_source()),
            Box::new(SourceSearchFeature::in_title()),
            Box::new(GeoFeature::near_coord()),
            Box::new(GeoFeature::boost_near_coord()),
            Box::new(GeoFeature::near_title(Arc::clone(&resolver))),
            Box::new(GeoFeature::boost_near_title(Arc::clone(&resolver))),
            Box::new(DateRangeFeature::last_edit_date()),
            Box::new(FileNumericFeature::file_size()),
            Box::new(FileNumericFeature::file_bits()),
            Box::new(FileNumericFeature::file_height()),
            Box::new(FileNumericFeature::file_width()),
            Box::new(FileNumericFeature::file_resolution()),
            Box::new(BoostTemplatesFeature::new()),
            Box::new(SubPageOfFeature::new()),
        ];
        QueryCompiler::new(config, features)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Compile one query string. Deterministic: the same term, params and
    /// collaborator answers produce an identical request.
    pub fn compile(&self, term: &str, params: &RequestParams) -> CompiledRequest {
        let mut ctx = CompilationContext::new(&self.config, params.namespaces.clone());
        ctx.add_syntax_used("full_text");

        let mut term = term.to_string();
        for feature in self.registry.iter() {
            term = feature.strip(&mut ctx, &term);
            if ctx.main_query().is_some() {
                // an exclusive keyword owns the whole search
                break;
            }
        }

        if ctx.results_possible() && ctx.main_query().is_none() {
            fulltext::assemble(&mut ctx, &term);
        }

        let request = self.finalize(ctx, params);
        tracing::debug!(
            cleaned_term = %request.cleaned_term,
            syntax = ?request.syntax_used,
            results_possible = request.results_possible,
            "compiled query"
        );
        request
    }

    /// Rebuild a request with a simplified boolean-only main query, for a
    /// one-shot retry after the backend rejected the primary formulation.
    /// `None` when there is no text to rebuild from.
    pub fn degrade(&self, request: &CompiledRequest) -> Option<CompiledRequest> {
        let main = fulltext::degraded_query(&self.config, &request.cleaned_term)?;
        let mut degraded = request.clone();
        degraded.highlight_query = Some(main.clone());
        degraded.main_query = main;
        degraded.phrase_rescore = None;
        degraded.syntax_used.insert("degraded_full_text".to_string());
        Some(degraded)
    }

    fn finalize(&self, ctx: CompilationContext<'_>, params: &RequestParams) -> CompiledRequest {
        let parts = ctx.into_parts();
        let main_query = if parts.results_possible {
            parts.main_query.unwrap_or(Query::MatchAll)
        } else {
            Query::MatchNone
        };

        let mut highlight: Vec<Query> = parts.highlight_query.into_iter().collect();
        highlight.extend(parts.non_text_highlight_queries);
        let highlight_query = match highlight.len() {
            0 => None,
            1 => highlight.pop(),
            _ => Some(Query::Bool(BoolQuery {
                should: highlight,
                minimum_should_match: Some(1),
                ..BoolQuery::default()
            })),
        };

        let phrase_rescore = parts
            .phrase_rescore_query
            .filter(|_| parts.results_possible)
            .map(|query| Rescore {
                query,
                window_size: self.config.phrase_rescore_window,
                weight: self.config.phrase_rescore_boost,
            });

        CompiledRequest {
            main_query,
            filters: parts.filters,
            not_filters: parts.not_filters,
            non_text_queries: parts.non_text_queries,
            highlight_query,
            phrase_rescore,
            highlight_fields: parts.highlight_fields,
            namespaces: parts.namespaces,
            offset: params.offset,
            limit: params.limit,
            suggest_prefixes: parts.suggest_prefixes,
            syntax_used: parts.syntax_used,
            warnings: parts.warnings,
            results_possible: parts.results_possible,
            cleaned_term: parts.cleaned_term,
            prefer_recent: parts.prefer_recent,
            boost_templates: parts.boost_templates,
            geo_boosts: parts.geo_boosts,
            local_only: parts.local_only,
        }
    }
}
