//! Scoring keywords: `boost-templates:` and `prefer-recent:`.
//!
//! Neither produces a filter; both only deposit scoring directives in the
//! context for the caller's ranking layer.

use crate::context::{CompilationContext, PreferRecent, WarningCollector};
use crate::query::Query;

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue, ValueDelimiters};

/// One `Template|NNN%` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateBoost {
    pub template: String,
    pub weight: f64,
}

/// `boost-templates:"Name|150% Other|50%"` overrides the deployment's
/// template boost table for this query. Malformed pairs are skipped without
/// comment; that leniency is long-standing behavior search strings depend
/// on.
pub struct BoostTemplatesFeature {
    spec: KeywordSpec,
}

impl BoostTemplatesFeature {
    pub fn new() -> Self {
        BoostTemplatesFeature { spec: KeywordSpec::simple("boost-templates", &["boost-templates"]) }
    }
}

impl Default for BoostTemplatesFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordFeature for BoostTemplatesFeature {
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
        let pattern = crate::regex!(r"([^|\s][^|]*)\|(\d+)% ?");
        let boosts: Vec<TemplateBoost> = pattern
            .captures_iter(value)
            .map(|caps| TemplateBoost {
                template: caps[1].trim().replace('_', " "),
                weight: caps[2].parse::<f64>().unwrap_or(0.0) / 100.0,
            })
            .collect();
        Some(ParsedValue::BoostTemplates(boosts))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        if let Some(ParsedValue::BoostTemplates(boosts)) = parsed {
            let map = boosts.iter().map(|b| (b.template.clone(), b.weight)).collect();
            ctx.set_boost_templates(map);
        }
        (None, false)
    }
}

/// `prefer-recent:` with an optional `decay[,half_life]` argument. An empty
/// value takes both numbers from the config; a malformed value is not
/// keyword syntax at all and stays in the query text.
pub struct PreferRecentFeature {
    spec: KeywordSpec,
}

impl PreferRecentFeature {
    pub fn new() -> Self {
        PreferRecentFeature {
            spec: KeywordSpec {
                allow_empty_value: true,
                delimiters: ValueDelimiters::BARE,
                ..KeywordSpec::simple("prefer-recent", &["prefer-recent"])
            },
        }
    }
}

impl Default for PreferRecentFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordFeature for PreferRecentFeature {
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
        let caps = crate::regex!(r"^(1|0?(?:\.\d+)?)?(?:,(\d*\.?\d+))?$").captures(value)?;
        let decay = caps.get(1).filter(|m| !m.as_str().is_empty()).and_then(|m| m.as_str().parse().ok());
        let half_life_days = caps.get(2).and_then(|m| m.as_str().parse().ok());
        Some(ParsedValue::PreferRecent { decay, half_life_days })
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(&ParsedValue::PreferRecent { decay, half_life_days }) = parsed else {
            return (None, true);
        };
        let options = PreferRecent {
            decay: decay.unwrap_or(ctx.config().prefer_recent_decay),
            half_life_days: half_life_days.unwrap_or(ctx.config().prefer_recent_half_life_days),
        };
        ctx.set_prefer_recent(options);
        (None, false)
    }
}
