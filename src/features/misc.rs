//! Small one-off keywords: `local:` and `subpageof:`.

use crate::context::{CompilationContext, WarningCollector};
use crate::query::Query;

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue, ValueDelimiters};

/// `local:` at the head of the query restricts the search to the local wiki
/// instead of any federated indices. Takes no value.
pub struct LocalFeature {
    spec: KeywordSpec,
}

impl LocalFeature {
    pub fn new() -> Self {
        LocalFeature {
            spec: KeywordSpec {
                name: "local",
                keywords: &["local"],
                has_value: false,
                allow_empty_value: false,
                query_header: true,
                greedy: false,
                delimiters: ValueDelimiters::empty(),
            },
        }
    }
}

impl Default for LocalFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordFeature for LocalFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        _key: &str,
        _value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        _warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        Some(ParsedValue::Empty)
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        _parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        ctx.set_local_only(true);
        (None, false)
    }
}

/// `subpageof:Foo` matches pages under `Foo/`. A trailing `*` is stripped
/// and a `/` appended when missing, so `Foo`, `Foo/` and `Foo*` are all the
/// same prefix.
pub struct SubPageOfFeature {
    spec: KeywordSpec,
}

impl SubPageOfFeature {
    pub fn new() -> Self {
        SubPageOfFeature { spec: KeywordSpec::simple("subpageof", &["subpageof"]) }
    }
}

impl Default for SubPageOfFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordFeature for SubPageOfFeature {
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
        let mut prefix = value.trim().trim_end_matches('*').to_string();
        if prefix.is_empty() {
            return None;
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Some(ParsedValue::Text(prefix))
    }

    fn apply(
        &self,
        _ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Text(prefix)) = parsed else {
            return (None, false);
        };
        let filter = Query::MultiMatch {
            query: prefix.clone(),
            fields: vec!["title.prefix".to_string(), "redirect.title.prefix".to_string()],
        };
        (Some(filter), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;

    #[test]
    fn local_toggles_the_context() {
        let feature = LocalFeature::new();
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        assert!(!ctx.local_only());
        let (filter, keep) = feature.apply(&mut ctx, "local", Some(&ParsedValue::Empty), false);
        assert_eq!(filter, None);
        assert!(!keep);
        assert!(ctx.local_only());
    }

    #[test]
    fn subpageof_normalizes_the_prefix() {
        let feature = SubPageOfFeature::new();
        let mut warnings = Vec::new();
        for raw in ["Help", "Help/", "Help*", "Help/*"] {
            let parsed = feature
                .parse_value("subpageof", raw, raw, Delimiter::Bare, "", &mut warnings)
                .unwrap();
            assert_eq!(parsed, ParsedValue::Text("Help/".to_string()), "input {raw:?}");
        }
    }

    #[test]
    fn subpageof_builds_a_prefix_multi_match() {
        let feature = SubPageOfFeature::new();
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = ParsedValue::Text("Help/".to_string());
        let (filter, _) = feature.apply(&mut ctx, "subpageof", Some(&parsed), false);
        match filter {
            Some(Query::MultiMatch { query, fields }) => {
                assert_eq!(query, "Help/");
                assert_eq!(fields, vec!["title.prefix", "redirect.title.prefix"]);
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn empty_subpageof_contributes_nothing() {
        let feature = SubPageOfFeature::new();
        let mut warnings = Vec::new();
        assert_eq!(
            feature.parse_value("subpageof", "*", "*", Delimiter::Bare, "", &mut warnings),
            None
        );
    }
}
