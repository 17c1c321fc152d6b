//! `insource:` and `intitle:`, the two keywords that accept a `/regex/`
//! delimited value next to the usual bare and quoted forms.
//!
//! The regex form builds a trigram-accelerated source-regex filter and is
//! gated by configuration; when disabled the keyword is still consumed so
//! the pattern never leaks into the full-text query, but only a warning
//! comes out. The plain form compiles to a query-string query over the
//! target fields.

use crate::context::{CompilationContext, HighlightConfig, WarningCollector};
use crate::escape::escape_part;
use crate::query::{Query, QueryStringQuery, SourceRegexQuery};

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue, ValueDelimiters};

#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Plain { query: String, phrase: bool },
    Regex { pattern: String, insensitive: bool },
}

pub struct SourceSearchFeature {
    spec: KeywordSpec,
    /// Field the regex form runs against, and its trigram index.
    regex_field: &'static str,
    ngram_field: &'static str,
    /// Fields the plain form searches.
    plain_fields: &'static [&'static str],
    /// Whether the plain form leaves its text in the query for scoring.
    keep_plain_text: bool,
}

impl SourceSearchFeature {
    pub fn in_source() -> Self {
        SourceSearchFeature {
            spec: KeywordSpec {
                delimiters: ValueDelimiters::BARE | ValueDelimiters::QUOTED | ValueDelimiters::REGEX,
                ..KeywordSpec::simple("insource", &["insource"])
            },
            regex_field: "source_text",
            ngram_field: "source_text.trigram",
            plain_fields: &["source_text.plain"],
            keep_plain_text: false,
        }
    }

    pub fn in_title() -> Self {
        SourceSearchFeature {
            spec: KeywordSpec {
                delimiters: ValueDelimiters::BARE | ValueDelimiters::QUOTED | ValueDelimiters::REGEX,
                ..KeywordSpec::simple("intitle", &["intitle"])
            },
            regex_field: "title",
            ngram_field: "title.trigram",
            plain_fields: &["title", "title.plain", "redirect.title", "redirect.title.plain"],
            keep_plain_text: true,
        }
    }
}

impl KeywordFeature for SourceSearchFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        _key: &str,
        value: &str,
        _quoted_value: &str,
        delimiter: Delimiter,
        suffix: &str,
        _warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        if value.is_empty() {
            return None;
        }
        let parsed = match delimiter {
            Delimiter::Regex => SourceValue::Regex {
                pattern: value.to_string(),
                insensitive: suffix.contains('i'),
            },
            Delimiter::Quoted => {
                SourceValue::Plain { query: value.to_string(), phrase: true }
            }
            Delimiter::Bare => SourceValue::Plain { query: value.to_string(), phrase: false },
        };
        Some(ParsedValue::Source(parsed))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Source(value)) = parsed else {
            return (None, false);
        };
        match value {
            SourceValue::Regex { pattern, insensitive } => {
                if !ctx.config().regex_enabled {
                    ctx.add_warning("feature-not-available", &[key]);
                    return (None, false);
                }
                let locale = ctx.config().language_code.clone();
                if !negated {
                    ctx.add_highlight_field(
                        self.regex_field,
                        HighlightConfig::Regex {
                            pattern: pattern.clone(),
                            locale: locale.clone(),
                            insensitive: *insensitive,
                        },
                    );
                }
                let filter = Query::SourceRegex(SourceRegexQuery {
                    pattern: pattern.clone(),
                    field: self.regex_field.to_string(),
                    ngram_field: self.ngram_field.to_string(),
                    case_sensitive: !insensitive,
                    locale,
                    max_determinized_states: ctx.config().regex_max_determinized_states,
                });
                (Some(filter), false)
            }
            SourceValue::Plain { query, phrase } => {
                let escaped = escape_part(query);
                // the matcher unescaped interior quotes; restore them so the
                // phrase stays balanced
                let text = if *phrase {
                    format!("\"{}\"", escaped.replace('"', "\\\""))
                } else {
                    escaped
                };
                let filter = Query::QueryString(QueryStringQuery {
                    query: text,
                    fields: self.plain_fields.iter().map(|f| f.to_string()).collect(),
                    phrase_slop: ctx.config().phrase_slop.precise,
                    default_operator: "AND".to_string(),
                    allow_leading_wildcard: ctx.config().allow_leading_wildcard,
                    fuzzy_prefix_length: 2,
                    rewrite: "top_terms_boost_1024".to_string(),
                    max_determinized_states: None,
                });
                (Some(filter), self.keep_plain_text && !negated)
            }
        }
    }

    fn syntax_tag(&self, key: &str, delimiter: Delimiter) -> String {
        match delimiter {
            Delimiter::Regex => "regex".to_string(),
            _ => key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;

    fn parse(feature: &SourceSearchFeature, value: &str, delimiter: Delimiter, suffix: &str) -> ParsedValue {
        let mut warnings = Vec::new();
        feature
            .parse_value("insource", value, value, delimiter, suffix, &mut warnings)
            .expect("value should parse")
    }

    #[test]
    fn regex_form_disabled_warns_but_still_strips() {
        let feature = SourceSearchFeature::in_source();
        let config = SearchConfig::default();
        assert!(!config.regex_enabled);
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "a.c", Delimiter::Regex, "");
        let (filter, keep) = feature.apply(&mut ctx, "insource", Some(&parsed), false);
        assert_eq!(filter, None);
        assert!(!keep);
        assert_eq!(ctx.warnings()[0].code, "feature-not-available");
        assert!(ctx.results_possible());
    }

    #[test]
    fn regex_form_builds_source_regex_filter() {
        let feature = SourceSearchFeature::in_source();
        let config = SearchConfig { regex_enabled: true, ..SearchConfig::default() };
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "a.c", Delimiter::Regex, "i");
        let (filter, _) = feature.apply(&mut ctx, "insource", Some(&parsed), false);
        match filter {
            Some(Query::SourceRegex(q)) => {
                assert_eq!(q.pattern, "a.c");
                assert_eq!(q.field, "source_text");
                assert_eq!(q.ngram_field, "source_text.trigram");
                assert!(!q.case_sensitive);
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn negated_regex_skips_highlighting() {
        let feature = SourceSearchFeature::in_source();
        let config = SearchConfig { regex_enabled: true, ..SearchConfig::default() };
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "a.c", Delimiter::Regex, "");
        feature.apply(&mut ctx, "insource", Some(&parsed), true);
        assert!(ctx.into_parts().highlight_fields.is_empty());
    }

    #[test]
    fn plain_intitle_keeps_text_unless_negated() {
        let feature = SourceSearchFeature::in_title();
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "dragons", Delimiter::Bare, "");
        let (filter, keep) = feature.apply(&mut ctx, "intitle", Some(&parsed), false);
        assert!(keep);
        match filter {
            Some(Query::QueryString(q)) => {
                assert_eq!(q.query, "dragons");
                assert!(q.fields.contains(&"redirect.title.plain".to_string()));
            }
            other => panic!("unexpected filter {other:?}"),
        }
        let (_, keep_negated) = feature.apply(&mut ctx, "intitle", Some(&parsed), true);
        assert!(!keep_negated);
    }

    #[test]
    fn quoted_insource_becomes_a_phrase() {
        let feature = SourceSearchFeature::in_source();
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "exact words", Delimiter::Quoted, "");
        let (filter, keep) = feature.apply(&mut ctx, "insource", Some(&parsed), false);
        assert!(!keep);
        match filter {
            Some(Query::QueryString(q)) => assert_eq!(q.query, "\"exact words\""),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn quoted_phrase_keeps_embedded_quotes_escaped() {
        let feature = SourceSearchFeature::in_source();
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let parsed = parse(&feature, "a\"b", Delimiter::Quoted, "");
        let (filter, _) = feature.apply(&mut ctx, "insource", Some(&parsed), false);
        match filter {
            Some(Query::QueryString(q)) => assert_eq!(q.query, "\"a\\\"b\""),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn regex_delimiter_tags_syntax_as_regex() {
        let feature = SourceSearchFeature::in_source();
        assert_eq!(feature.syntax_tag("insource", Delimiter::Regex), "regex");
        assert_eq!(feature.syntax_tag("insource", Delimiter::Bare), "insource");
    }
}
