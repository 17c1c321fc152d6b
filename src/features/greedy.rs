//! The greedy keywords: `morelike:`, `morelikewithwikibase:` and `prefix:`.
//!
//! These are the only keywords allowed to swallow the rest of the query
//! string, and they run before every ordinary feature. The morelike pair is
//! exclusive on top of that: it installs the main query directly and the
//! pipeline stops feature processing once a main query exists.

use std::sync::Arc;

use crate::context::{CompilationContext, WarningCollector};
use crate::query::Query;
use crate::resolve::TitleResolver;

use super::{resolver_miss, Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

/// Seed a similarity search from one or more existing pages.
pub struct MoreLikeFeature {
    spec: KeywordSpec,
    /// Additionally require a linked wikibase item on every hit.
    require_wikibase_item: bool,
    resolver: Arc<dyn TitleResolver>,
}

impl MoreLikeFeature {
    pub fn more_like(resolver: Arc<dyn TitleResolver>) -> Self {
        MoreLikeFeature {
            spec: KeywordSpec {
                query_header: true,
                greedy: true,
                ..KeywordSpec::simple("morelike", &["morelike"])
            },
            require_wikibase_item: false,
            resolver,
        }
    }

    pub fn more_like_with_wikibase(resolver: Arc<dyn TitleResolver>) -> Self {
        MoreLikeFeature {
            spec: KeywordSpec {
                query_header: true,
                greedy: true,
                ..KeywordSpec::simple("morelikewithwikibase", &["morelikewithwikibase"])
            },
            require_wikibase_item: true,
            resolver,
        }
    }
}

impl KeywordFeature for MoreLikeFeature {
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
        let titles: Vec<String> = value
            .split('|')
            .map(|t| t.trim().replace('_', " "))
            .filter(|t| !t.is_empty())
            .collect();
        if titles.is_empty() {
            return None;
        }
        Some(ParsedValue::Titles(titles))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Titles(titles)) = parsed else {
            ctx.disable_results();
            return (None, false);
        };
        let mut like = Vec::new();
        let mut exclude_page_ids = Vec::new();
        for title in titles {
            match self.resolver.resolve_title(title) {
                Ok(resolved) => {
                    like.push(resolved.title);
                    exclude_page_ids.push(resolved.page_id);
                }
                Err(err) => resolver_miss(ctx, err),
            }
        }
        if like.is_empty() {
            ctx.add_warning("morelike-no-valid-titles", &[]);
            ctx.disable_results();
            return (None, false);
        }
        if self.require_wikibase_item {
            ctx.add_filter(Query::Exists { field: "wikibase_item".to_string() });
        }
        ctx.set_main_query(Query::MoreLikeThis {
            fields: vec!["text".to_string()],
            like,
            exclude_page_ids,
        });
        ctx.set_highlight_query(Query::MatchAll);
        (None, false)
    }

    fn syntax_tag(&self, _key: &str, _delimiter: Delimiter) -> String {
        "more_like".to_string()
    }
}

/// Namespace selector parsed off the front of a `prefix:` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceSelector {
    /// `all:` lifts any namespace restriction.
    Any,
    Id(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixValue {
    /// Verbatim value text, for suggestion reassembly.
    pub raw: String,
    pub prefix: String,
    pub namespace: Option<NamespaceSelector>,
}

/// `prefix:` restricts hits to titles under a literal prefix; the rest of
/// the query still searches normally. Always matched last in the string,
/// first in feature order.
pub struct PrefixFeature {
    spec: KeywordSpec,
}

impl PrefixFeature {
    pub fn new() -> Self {
        PrefixFeature {
            spec: KeywordSpec { greedy: true, ..KeywordSpec::simple("prefix", &["prefix"]) },
        }
    }
}

impl Default for PrefixFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordFeature for PrefixFeature {
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
        let raw = value.to_string();
        let mut rest = value.trim().trim_end_matches('*');
        let mut namespace = None;
        if let Some(stripped) = rest.strip_prefix("all:") {
            namespace = Some(NamespaceSelector::Any);
            rest = stripped;
        } else if let Some(caps) = crate::regex!(r"^(\d+):").captures(rest) {
            if let Ok(id) = caps[1].parse() {
                namespace = Some(NamespaceSelector::Id(id));
                rest = &rest[caps.get(0).map_or(0, |m| m.end())..];
            }
        }
        Some(ParsedValue::Prefix(PrefixValue {
            raw,
            prefix: rest.trim_start().to_string(),
            namespace,
        }))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Prefix(value)) = parsed else {
            return (None, false);
        };
        ctx.add_suggest_prefix(&format!("{key}:{} ", value.raw));
        match value.namespace {
            Some(NamespaceSelector::Any) => ctx.set_namespaces(None),
            Some(NamespaceSelector::Id(id)) => ctx.set_namespaces(Some(vec![id])),
            None => {}
        }
        if value.prefix.is_empty() {
            return (None, false);
        }
        (Some(Query::match_field("title.prefix", value.prefix.clone())), false)
    }
}
