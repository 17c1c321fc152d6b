//! Prefix/autocomplete assembler.
//!
//! Bypasses the keyword pipeline entirely: a leading namespace selector is
//! stripped with the extraction engine and the rest of the text becomes one
//! multi-match over the title and redirect prefix fields. Alternate
//! spellings ("second try" variants, e.g. keyboard-layout swaps) blend in
//! at geometrically decaying weight.

use crate::config::SearchConfig;
use crate::extract::{extract_to_string, Replacement};
use crate::query::{weighted_field, BoolQuery, Query};

/// Per-variant weight decay; variant `n` scores at `0.2^n` of the primary.
const VARIANT_DECAY: f64 = 0.2;

/// A compiled autocomplete request.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixSearch {
    pub query: Query,
    /// Namespace restriction after honoring a leading `all:` or `<id>:`
    /// selector; `None` lifts any restriction.
    pub namespaces: Option<Vec<u32>>,
}

/// Compile `term` into an autocomplete query. `variants` are alternate
/// spellings in decreasing order of confidence.
pub fn prefix_search(
    config: &SearchConfig,
    namespaces: Option<Vec<u32>>,
    term: &str,
    variants: &[String],
) -> PrefixSearch {
    let mut namespaces = namespaces;
    let pattern = crate::regex!(r"^\s*(?P<ns>all|\d+):");
    let term = extract_to_string(term, pattern, |m| {
        match m.group("ns") {
            Some("all") => namespaces = None,
            Some(id) => {
                if let Ok(id) = id.parse() {
                    namespaces = Some(vec![id]);
                }
            }
            None => {}
        }
        Replacement::Drop
    });
    let term = term.trim();
    if term.is_empty() {
        return PrefixSearch { query: Query::MatchNone, namespaces };
    }

    let mut clauses = vec![prefix_clause(config, term, 1.0)];
    for (rank, variant) in variants.iter().enumerate() {
        let weight = VARIANT_DECAY.powi(rank as i32 + 1);
        clauses.push(prefix_clause(config, variant, weight));
    }
    let query = if clauses.len() == 1 {
        clauses.pop().unwrap_or(Query::MatchNone)
    } else {
        Query::Bool(BoolQuery {
            should: clauses,
            minimum_should_match: Some(1),
            ..BoolQuery::default()
        })
    };
    PrefixSearch { query, namespaces }
}

fn prefix_clause(config: &SearchConfig, text: &str, weight: f64) -> Query {
    let w = &config.prefix_weights;
    Query::MultiMatch {
        query: text.to_string(),
        fields: vec![
            weighted_field("title.prefix", w.title * weight),
            weighted_field("redirect.title.prefix", w.redirect * weight),
            weighted_field("title.prefix_asciifolding", w.title_asciifolding * weight),
            weighted_field("redirect.title.prefix_asciifolding", w.redirect_asciifolding * weight),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_term_builds_one_multi_match() {
        let config = SearchConfig::default();
        let search = prefix_search(&config, None, "kangaroo", &[]);
        match search.query {
            Query::MultiMatch { query, fields } => {
                assert_eq!(query, "kangaroo");
                assert_eq!(
                    fields,
                    vec![
                        "title.prefix^10",
                        "redirect.title.prefix^1",
                        "title.prefix_asciifolding^7",
                        "redirect.title.prefix_asciifolding^0.7",
                    ]
                );
            }
            other => panic!("unexpected query {other:?}"),
        }
    }

    #[test]
    fn variants_decay_geometrically() {
        let config = SearchConfig::default();
        let variants = vec!["kangaroo".to_string(), "kangourou".to_string()];
        let search = prefix_search(&config, None, "rangaroo", &variants);
        match search.query {
            Query::Bool(b) => {
                assert_eq!(b.should.len(), 3);
                match &b.should[1] {
                    Query::MultiMatch { fields, .. } => {
                        // first variant runs at a fifth of the primary weight
                        assert_eq!(fields[0], "title.prefix^2");
                    }
                    other => panic!("unexpected clause {other:?}"),
                }
                match &b.should[2] {
                    Query::MultiMatch { fields, .. } => {
                        assert_eq!(fields[0], "title.prefix^0.4");
                    }
                    other => panic!("unexpected clause {other:?}"),
                }
            }
            other => panic!("unexpected query {other:?}"),
        }
    }

    #[test]
    fn namespace_selector_is_stripped() {
        let config = SearchConfig::default();
        let search = prefix_search(&config, Some(vec![0]), "6:Kang", &[]);
        assert_eq!(search.namespaces, Some(vec![6]));
        match search.query {
            Query::MultiMatch { query, .. } => assert_eq!(query, "Kang"),
            other => panic!("unexpected query {other:?}"),
        }
        let lifted = prefix_search(&config, Some(vec![0]), "all:Kang", &[]);
        assert_eq!(lifted.namespaces, None);
    }

    #[test]
    fn empty_term_matches_nothing() {
        let config = SearchConfig::default();
        let search = prefix_search(&config, None, "  ", &[]);
        assert_eq!(search.query, Query::MatchNone);
    }
}
