//! Full-text assembler.
//!
//! Turns whatever text survived keyword extraction into the final weighted
//! query. The text is split into segments by two extraction passes, then
//! joined back into parallel query strings:
//!
//! ```text
//! "exact words" big* cat
//! └─────┬─────┘ └─┬┘ └┬┘
//!  phrase pass    │    raw: escaped into both strings, verbatim
//!                 │    into the near-match text
//!                 wildcard pass: plain fields only
//! ```
//!
//! The "escaped" string targets the combined all field and feeds the main
//! query and the phrase rescore; the "non-all" string expands the same
//! tokens per field and feeds only the highlight query, because the
//! highlighter cannot attribute matches made through the combined field.

use crate::config::{SearchConfig, FILE_NAMESPACE};
use crate::context::{CompilationContext, WarningCollector};
use crate::escape::{balance_quotes, escape_part, fixup_dangling_operators, fixup_whole};
use crate::extract::{extract, rescan_raw, Replacement, Segment};
use crate::query::{
    weighted_field, BoolQuery, Query, QueryStringQuery, TokenCountCondition,
};

/// Run the assembler over the post-extraction text, installing the main,
/// highlight and rescore queries in the context.
pub(crate) fn assemble(ctx: &mut CompilationContext<'_>, term: &str) {
    let term = balance_quotes(term);
    let term = term.trim();

    // Quoted phrases, with escaped embedded quotes, an optional ~N slop and
    // an optional trailing ~ that re-enables stemming.
    let phrase_pattern =
        crate::regex!(r#"(?P<negate>-|!)?(?P<main>"(?:\\"|[^"])+"(?P<slop>~\d+)?)(?P<fuzzy>~)?"#);
    let segments = extract(term, phrase_pattern, |m| {
        if m.preceded_by('\\') || m.preceded_by(']') {
            return Replacement::Reject;
        }
        let negate = if m.group("negate").is_some() { "NOT " } else { "" };
        let main = escape_part(m.group("main").unwrap_or(""));

        if negate.is_empty() && m.group("fuzzy").is_none() && m.group("slop").is_none() {
            if let Some(caps) = crate::regex!(r#"^"([^"*]+)\*""#).captures(&main) {
                // a phrase ending in * is a phrase-prefix search; stemming
                // would garble the prefix so it runs on the plain field
                let stem = caps[1].to_string();
                ctx.add_syntax_used("phrase_match_prefix");
                ctx.add_non_text_query(Query::MatchPhrasePrefix {
                    field: "all.plain".to_string(),
                    query: stem.clone(),
                });
                ctx.add_non_text_highlight_query(query_string(
                    ctx.config(),
                    vec!["all.plain".to_string()],
                    format!("{stem}*"),
                    ctx.config().phrase_slop.default,
                ));
                return Replacement::Drop;
            }
        }

        if m.group("fuzzy").is_some() {
            return Replacement::Escaped(format!("{negate}{main}"));
        }
        let main = if m.group("slop").is_none() {
            format!("{main}~{}", ctx.config().phrase_slop.precise)
        } else {
            main
        };
        // phrases must also exist per field or the highlighter cannot see
        // them; terms need no such duplication
        Replacement::EscapedNonAll {
            escaped: format!("{negate}{}", switch_to_exact(ctx, &main, true)),
            non_all: format!("{negate}{}", switch_to_exact(ctx, &main, false)),
        }
    });

    // Wildcard tokens match only against the plain fields; users do not
    // expect stemming in prefix matches.
    let segments = rescan_raw(segments, crate::regex!(r"\w+\*(?:\w*\*?)*"), |m| {
        let token = m.whole();
        if crate::regex!(r"[*?]+").find_iter(token).count() > ctx.config().max_wildcards {
            ctx.add_warning("regex-too-complex", &[]);
            ctx.disable_results();
        }
        let fixed = escape_part(token);
        let exact = format!(
            "({} OR all.plain:{fixed})",
            weighted_field(&format!("title.plain:{fixed}"), ctx.config().weights.title)
        );
        Replacement::EscapedNonAll { escaped: exact.clone(), non_all: exact }
    });

    let mut escaped_parts = Vec::new();
    let mut non_all_parts = Vec::new();
    let mut near_match_parts = Vec::new();
    for segment in segments {
        match segment {
            Segment::Raw(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                // finalized segments carry their own syntax and are exempt
                // from the fixup, so it runs per raw part here
                let fixed = fixup_whole(&escape_part(raw));
                escaped_parts.push(fixed.clone());
                non_all_parts.push(fixed);
                // the near match runs unescaped against an exact field
                near_match_parts.push(raw.to_string());
            }
            Segment::Escaped { escaped, non_all } => {
                non_all_parts.push(non_all.unwrap_or_else(|| escaped.clone()));
                escaped_parts.push(escaped);
            }
        }
    }

    // operator words need an operand on each side; a dangling one would
    // make the backend parser error out, so it is demoted to a plain term
    let query_text = fixup_dangling_operators(&escaped_parts.join(" "));
    ctx.set_cleaned_term(&query_text);

    if query_text.is_empty() {
        ctx.add_syntax_used("filter_only");
        ctx.set_highlight_query(Query::MatchAll);
        return;
    }

    if uses_query_string_syntax(&query_text) {
        ctx.add_syntax_used("query_string");
    }

    let config = ctx.config();
    let namespaces: Option<Vec<u32>> = ctx.namespaces().map(|ns| ns.to_vec());
    let namespaces = namespaces.as_deref();
    let mut fields = full_text_fields(config, namespaces, 1.0, ".plain", true);
    fields.extend(full_text_fields(config, namespaces, config.stemmed_weight, "", true));

    ctx.add_syntax_used("full_text_querystring");
    let text_query =
        query_string(config, fields.clone(), query_text.clone(), config.phrase_slop.default);
    let near_match = crate::nearmatch::near_match_query(config, &near_match_parts.join(" "));
    let main = match near_match {
        Query::MatchNone => text_query.clone(),
        near_match => Query::Bool(BoolQuery {
            should: vec![text_query.clone(), near_match],
            minimum_should_match: Some(1),
            ..BoolQuery::default()
        }),
    };
    ctx.set_main_query(main);

    let mut non_all_fields = full_text_fields(config, namespaces, 1.0, ".plain", false);
    non_all_fields.extend(full_text_fields(config, namespaces, config.stemmed_weight, "", false));
    let non_all_text = fixup_dangling_operators(&non_all_parts.join(" "));
    ctx.set_highlight_query(query_string(config, non_all_fields, non_all_text, 1));

    // Queries already carrying quotes contain a phrase query and cannot be
    // re-wrapped; single-token queries gain nothing from proximity.
    if !query_text.contains('"')
        && (config.token_count_router || query_text.contains(' '))
    {
        let phrase = query_string(
            config,
            fields,
            format!("\"{query_text}\""),
            config.phrase_slop.boost,
        );
        ctx.set_phrase_rescore_query(route_by_token_count(config, &query_text, phrase));
    }
}

/// Rebuild a simplified boolean-only query from an already compiled term,
/// for a one-shot retry after the backend rejects the primary formulation.
pub(crate) fn degraded_query(config: &SearchConfig, cleaned_term: &str) -> Option<Query> {
    if cleaned_term.is_empty() {
        return None;
    }
    let mut fields = full_text_fields(config, None, 1.0, ".plain", true);
    fields.extend(full_text_fields(config, None, config.stemmed_weight, "", true));
    Some(Query::SimpleQueryString {
        query: cleaned_term.to_string(),
        fields,
        default_operator: "AND".to_string(),
        // everything costly stays off
        flags: "OR|AND".to_string(),
    })
}

fn query_string(
    config: &SearchConfig,
    fields: Vec<String>,
    query: String,
    phrase_slop: u32,
) -> Query {
    Query::QueryString(QueryStringQuery {
        query,
        fields,
        phrase_slop,
        default_operator: "AND".to_string(),
        allow_leading_wildcard: config.allow_leading_wildcard,
        fuzzy_prefix_length: 2,
        rewrite: "top_terms_boost_1024".to_string(),
        max_determinized_states: None,
    })
}

/// Expand `term` to an explicit OR across the searched fields, as a
/// query-string fragment.
fn switch_to_exact(ctx: &CompilationContext<'_>, term: &str, all_allowed: bool) -> String {
    let namespaces: Option<Vec<u32>> = ctx.namespaces().map(|ns| ns.to_vec());
    let exact = full_text_fields(
        ctx.config(),
        namespaces.as_deref(),
        1.0,
        &format!(".plain:{term}"),
        all_allowed,
    );
    format!("({})", exact.join(" OR "))
}

/// The weighted field list for one tier of the search. `all_allowed` is
/// false when collecting fields for the highlighter, which cannot use the
/// combined field.
fn full_text_fields(
    config: &SearchConfig,
    namespaces: Option<&[u32]>,
    weight: f64,
    suffix: &str,
    all_allowed: bool,
) -> Vec<String> {
    if all_allowed {
        return vec![weighted_field(&format!("all{suffix}"), weight)];
    }
    let w = &config.weights;
    let mut fields = vec![
        weighted_field(&format!("title{suffix}"), weight * w.title),
        weighted_field(&format!("redirect.title{suffix}"), weight * w.redirect),
        weighted_field(&format!("category{suffix}"), weight * w.category),
        weighted_field(&format!("heading{suffix}"), weight * w.heading),
        weighted_field(&format!("opening_text{suffix}"), weight * w.opening_text),
        weighted_field(&format!("text{suffix}"), weight * w.text),
        weighted_field(&format!("auxiliary_text{suffix}"), weight * w.auxiliary_text),
    ];
    if namespaces.is_none_or(|ns| ns.contains(&FILE_NAMESPACE)) {
        fields.push(weighted_field(&format!("file_text{suffix}"), weight * w.file_text));
    }
    fields
}

fn route_by_token_count(config: &SearchConfig, text: &str, phrase: Query) -> Query {
    if !config.token_count_router {
        return phrase;
    }
    let mut conditions = Vec::new();
    if config.max_phrase_tokens > 0 {
        conditions.push(TokenCountCondition {
            gt: config.max_phrase_tokens as u32,
            query: Query::MatchNone,
        });
    }
    conditions.push(TokenCountCondition { gt: 1, query: phrase });
    Query::TokenCountRouter {
        text: text.to_string(),
        field: "text".to_string(),
        fallback: Box::new(Query::MatchNone),
        conditions,
    }
}

/// Does the escaped text still carry operators the backend's query-string
/// parser will interpret? Tagged for diagnostics only.
fn uses_query_string_syntax(text: &str) -> bool {
    if text.contains('"') {
        return true;
    }
    if crate::regex!(r"(^|\s)[+!-]\S").is_match(text) {
        return true;
    }
    if crate::regex!(r"\s(AND|OR|NOT|&&|\|\|)\s").is_match(text) || text.starts_with("NOT ") {
        return true;
    }
    // unescaped wildcards and fuzzy suffixes; a preceding backslash
    // neutralizes both
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if (c == '*' || c == '?') && prev != Some('\\') {
            return true;
        }
        if c == '~' && prev.is_some_and(|p| !p.is_whitespace() && p != '\\') {
            let rest = text[i + 1..].trim_start_matches(|ch: char| ch.is_ascii_digit());
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return true;
            }
        }
        prev = Some(c);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RangeParams;

    fn compile(term: &str, config: &SearchConfig) -> CompilationContext<'static> {
        // leak keeps the test helper signature simple; tests are short-lived
        let config: &'static SearchConfig = Box::leak(Box::new(config.clone()));
        let mut ctx = CompilationContext::new(config, None);
        assemble(&mut ctx, term);
        ctx
    }

    #[test]
    fn plain_words_build_main_highlight_and_rescore() {
        let ctx = compile("some words", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "some words");
        let parts = ctx.into_parts();
        match parts.main_query {
            Some(Query::Bool(b)) => {
                assert_eq!(b.should.len(), 2);
                match &b.should[0] {
                    Query::QueryString(q) => {
                        assert_eq!(q.query, "some words");
                        assert_eq!(q.fields, vec!["all.plain^1", "all^0.5"]);
                        assert_eq!(q.default_operator, "AND");
                    }
                    other => panic!("unexpected text query {other:?}"),
                }
                match &b.should[1] {
                    Query::MultiMatch { query, .. } => assert_eq!(query, "some words"),
                    other => panic!("unexpected near match {other:?}"),
                }
            }
            other => panic!("unexpected main query {other:?}"),
        }
        match parts.phrase_rescore_query {
            Some(Query::QueryString(q)) => {
                assert_eq!(q.query, "\"some words\"");
                assert_eq!(q.phrase_slop, 1);
            }
            other => panic!("unexpected rescore {other:?}"),
        }
        match parts.highlight_query {
            Some(Query::QueryString(q)) => {
                assert!(q.fields.contains(&"title.plain^20".to_string()));
                assert!(q.fields.contains(&"file_text^0.25".to_string()));
                assert!(!q.fields.iter().any(|f| f.starts_with("all")));
            }
            other => panic!("unexpected highlight {other:?}"),
        }
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let config = SearchConfig::default();
        let a = compile("plain words only", &config);
        let b = compile("plain words only", &config);
        assert_eq!(a.cleaned_term(), b.cleaned_term());
        let (a, b) = (a.into_parts(), b.into_parts());
        assert_eq!(a.main_query, b.main_query);
        assert_eq!(a.highlight_query, b.highlight_query);
        assert!(a.filters.is_empty());
    }

    #[test]
    fn single_token_skips_the_rescore() {
        let ctx = compile("word", &SearchConfig::default());
        assert!(ctx.into_parts().phrase_rescore_query.is_none());
    }

    #[test]
    fn quoted_phrase_expands_per_field() {
        let ctx = compile("\"exact words\"", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "(all.plain:\"exact words\"~0^1)");
        let parts = ctx.into_parts();
        // quoted input means no rescore; a phrase query already exists
        assert!(parts.phrase_rescore_query.is_none());
        match parts.highlight_query {
            Some(Query::QueryString(q)) => {
                assert!(q.query.starts_with("(title.plain:\"exact words\"~0^20 OR "));
            }
            other => panic!("unexpected highlight {other:?}"),
        }
    }

    #[test]
    fn unbalanced_quote_is_closed_first() {
        let ctx = compile("\"foo", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "(all.plain:\"foo\"~0^1)");
    }

    #[test]
    fn negated_phrase_keeps_the_not_operator() {
        let ctx = compile("-\"a b\" word", &SearchConfig::default());
        assert!(ctx.cleaned_term().starts_with("NOT (all.plain:\"a b\"~0^1)"));
    }

    #[test]
    fn stemmed_phrase_passes_through_unexpanded() {
        // the trailing ~ re-enables stemming: no per-field expansion, no
        // precise-slop suffix, just the bare phrase against all fields
        let ctx = compile("\"a boat\"~", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "\"a boat\"");
    }

    #[test]
    fn phrase_prefix_becomes_a_non_text_query() {
        let config = SearchConfig::default();
        let config_ref: &'static SearchConfig = Box::leak(Box::new(config));
        let mut ctx = CompilationContext::new(config_ref, None);
        assemble(&mut ctx, "\"jimmy pag*\"");
        assert!(ctx.is_syntax_used("phrase_match_prefix"));
        assert!(ctx.is_syntax_used("filter_only"));
        let parts = ctx.into_parts();
        assert_eq!(
            parts.non_text_queries,
            vec![Query::MatchPhrasePrefix {
                field: "all.plain".to_string(),
                query: "jimmy pag".to_string(),
            }]
        );
        assert_eq!(parts.non_text_highlight_queries.len(), 1);
    }

    #[test]
    fn wildcards_search_plain_fields_only() {
        let ctx = compile("big*", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "(title.plain:big*^20 OR all.plain:big*)");
        assert!(ctx.is_syntax_used("query_string"));
        assert!(ctx.results_possible());
    }

    #[test]
    fn wildcard_budget_rejects_with_one_warning() {
        let config = SearchConfig { max_wildcards: 2, ..SearchConfig::default() };
        let ctx = compile("a**b**c**", &config);
        assert!(!ctx.results_possible());
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.warnings()[0].code, "regex-too-complex");

        let ctx = compile("a*b", &config);
        assert!(ctx.results_possible());
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn empty_text_is_filter_only() {
        let config: &'static SearchConfig = Box::leak(Box::new(SearchConfig::default()));
        let mut ctx = CompilationContext::new(config, None);
        ctx.add_filter(Query::Range {
            field: "timestamp".to_string(),
            params: RangeParams::default(),
        });
        assemble(&mut ctx, "   ");
        assert!(ctx.is_syntax_used("filter_only"));
        let parts = ctx.into_parts();
        assert_eq!(parts.main_query, None);
        assert_eq!(parts.highlight_query, Some(Query::MatchAll));
    }

    #[test]
    fn file_text_drops_out_of_restricted_namespaces() {
        let config = SearchConfig::default();
        let fields = full_text_fields(&config, Some(&[0, 1]), 1.0, "", false);
        assert!(!fields.iter().any(|f| f.starts_with("file_text")));
        let fields = full_text_fields(&config, Some(&[0, FILE_NAMESPACE]), 1.0, "", false);
        assert!(fields.iter().any(|f| f.starts_with("file_text")));
    }

    #[test]
    fn fuzzy_suffixes_are_repaired_in_the_joined_string() {
        let ctx = compile("word~bar other", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "word\\~bar other");
    }

    #[test]
    fn dangling_operators_are_demoted_to_terms() {
        let ctx = compile("cats AND", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "cats and");
        assert!(!ctx.is_syntax_used("query_string"));

        let ctx = compile("OR cats", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "or cats");

        let ctx = compile("cats AND dogs", &SearchConfig::default());
        assert_eq!(ctx.cleaned_term(), "cats AND dogs");
    }

    #[test]
    fn token_count_router_wraps_the_rescore() {
        let config = SearchConfig {
            token_count_router: true,
            max_phrase_tokens: 10,
            ..SearchConfig::default()
        };
        let ctx = compile("some words", &config);
        match ctx.into_parts().phrase_rescore_query {
            Some(Query::TokenCountRouter { text, conditions, .. }) => {
                assert_eq!(text, "some words");
                assert_eq!(conditions.len(), 2);
                assert_eq!(conditions[0].gt, 10);
                assert_eq!(conditions[1].gt, 1);
            }
            other => panic!("unexpected rescore {other:?}"),
        }
    }

    #[test]
    fn degraded_query_uses_boolean_flags_only() {
        let config = SearchConfig::default();
        match degraded_query(&config, "some words") {
            Some(Query::SimpleQueryString { query, flags, default_operator, .. }) => {
                assert_eq!(query, "some words");
                assert_eq!(flags, "OR|AND");
                assert_eq!(default_operator, "AND");
            }
            other => panic!("unexpected degraded query {other:?}"),
        }
        assert_eq!(degraded_query(&config, ""), None);
    }
}
