//! `deepcat:` / `deepcategory:` expands a category through the category
//! graph and filters on the whole subtree.
//!
//! Expansion is bounded by depth and by result count from the config. An
//! over-budget subtree is a policy rejection: the query is declared
//! impossible rather than silently searched against a truncated tree.

use std::sync::Arc;

use crate::context::{CompilationContext, WarningCollector};
use crate::query::Query;
use crate::resolve::CategoryGraph;

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

pub struct DeepCategoryFeature {
    spec: KeywordSpec,
    max_depth: u32,
    max_categories: usize,
    graph: Arc<dyn CategoryGraph>,
}

impl DeepCategoryFeature {
    pub fn new(max_depth: u32, max_categories: usize, graph: Arc<dyn CategoryGraph>) -> Self {
        DeepCategoryFeature {
            spec: KeywordSpec::simple("deepcategory", &["deepcat", "deepcategory"]),
            max_depth,
            max_categories,
            graph,
        }
    }
}

impl KeywordFeature for DeepCategoryFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        _key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        _warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let root = value.trim().replace('_', " ");
        if root.is_empty() {
            return None;
        }
        Some(ParsedValue::DeepCategory(root))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::DeepCategory(root)) = parsed else {
            return (None, false);
        };
        let categories = match self.graph.subcategories(root, self.max_depth, self.max_categories)
        {
            Ok(categories) => categories,
            Err(err) => {
                tracing::warn!(%err, category = %root, "category graph unavailable");
                ctx.add_warning("deepcat-unavailable", &[key]);
                return (None, false);
            }
        };
        if categories.len() > self.max_categories {
            ctx.add_warning("deepcat-too-many", &[key, &self.max_categories.to_string()]);
            ctx.disable_results();
            return (None, false);
        }
        let clauses = categories
            .into_iter()
            .map(|name| Query::match_field("category.lowercase_keyword", name))
            .collect();
        (Some(Query::bool_or(clauses)), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::error::ResolveError;
    use crate::query::BoolQuery;

    struct FixedGraph(Vec<&'static str>);

    impl CategoryGraph for FixedGraph {
        fn subcategories(
            &self,
            _root: &str,
            _max_depth: u32,
            _limit: usize,
        ) -> Result<Vec<String>, ResolveError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct BrokenGraph;

    impl CategoryGraph for BrokenGraph {
        fn subcategories(
            &self,
            _root: &str,
            _max_depth: u32,
            _limit: usize,
        ) -> Result<Vec<String>, ResolveError> {
            Err(ResolveError::Unavailable("graph endpoint down".to_string()))
        }
    }

    fn apply_with(graph: Arc<dyn CategoryGraph>, max: usize) -> (Option<Query>, SearchConfig) {
        let feature = DeepCategoryFeature::new(3, max, graph);
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = ParsedValue::DeepCategory("Music".to_string());
        let (filter, keep) = feature.apply(&mut ctx, "deepcat", Some(&parsed), false);
        assert!(!keep);
        (filter, config)
    }

    #[test]
    fn expands_to_or_of_subcategories() {
        let (filter, _) = apply_with(Arc::new(FixedGraph(vec!["Music", "Jazz", "Blues"])), 8);
        match filter {
            Some(Query::Bool(BoolQuery { should, .. })) => assert_eq!(should.len(), 3),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn over_budget_expansion_rejects_the_query() {
        let feature = DeepCategoryFeature::new(3, 2, Arc::new(FixedGraph(vec!["a", "b", "c"])));
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = ParsedValue::DeepCategory("Music".to_string());
        let (filter, _) = feature.apply(&mut ctx, "deepcat", Some(&parsed), false);
        assert_eq!(filter, None);
        assert!(!ctx.results_possible());
        assert_eq!(ctx.warnings()[0].code, "deepcat-too-many");
    }

    #[test]
    fn graph_failure_degrades_to_warning() {
        let feature = DeepCategoryFeature::new(3, 8, Arc::new(BrokenGraph));
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = ParsedValue::DeepCategory("Music".to_string());
        let (filter, _) = feature.apply(&mut ctx, "deepcat", Some(&parsed), false);
        assert_eq!(filter, None);
        assert!(ctx.results_possible());
        assert_eq!(ctx.warnings()[0].code, "deepcat-unavailable");
    }
}
