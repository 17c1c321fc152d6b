//! Compiler configuration.
//!
//! Everything here is read-only once the compiler is constructed and is
//! safe to share between concurrent compilations. The defaults mirror a
//! typical production deployment; tests rely on them being stable.

use std::collections::BTreeMap;

/// Per-field scoring weights used when the combined ("all") field cannot be
/// used, e.g. for the highlight query.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWeights {
    pub title: f64,
    pub redirect: f64,
    pub category: f64,
    pub heading: f64,
    pub opening_text: f64,
    pub text: f64,
    pub auxiliary_text: f64,
    pub file_text: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        FieldWeights {
            title: 20.0,
            redirect: 15.0,
            category: 8.0,
            heading: 5.0,
            opening_text: 3.0,
            text: 1.0,
            auxiliary_text: 0.5,
            file_text: 0.5,
        }
    }
}

/// Weights for the prefix/autocomplete assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixWeights {
    pub title: f64,
    pub redirect: f64,
    pub title_asciifolding: f64,
    pub redirect_asciifolding: f64,
}

impl Default for PrefixWeights {
    fn default() -> Self {
        PrefixWeights { title: 10.0, redirect: 1.0, title_asciifolding: 7.0, redirect_asciifolding: 0.7 }
    }
}

/// Phrase slop settings: `default` is applied to the main query-string
/// query, `precise` to explicitly quoted phrases without a user slop, and
/// `boost` to the phrase-rescore query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseSlop {
    pub default: u32,
    pub precise: u32,
    pub boost: u32,
}

impl Default for PhraseSlop {
    fn default() -> Self {
        PhraseSlop { default: 0, precise: 0, boost: 1 }
    }
}

/// Namespace id of the file namespace; `file_text` is only searched when
/// the namespace restriction includes it (or there is no restriction).
pub const FILE_NAMESPACE: u32 = 6;

/// Read-only compiler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub weights: FieldWeights,
    pub prefix_weights: PrefixWeights,
    pub phrase_slop: PhraseSlop,
    /// Weight of the stemmed fields relative to the plain fields.
    pub stemmed_weight: f64,
    /// Weight of the near-match fallback blended into the main query.
    pub near_match_weight: f64,
    /// Maximum number of wildcard groups a single query may carry before it
    /// is declared impossible (protects the backend automaton expansion).
    pub max_wildcards: usize,
    /// Maximum number of `|`-separated values accepted by one keyword.
    pub max_keyword_conditions: usize,
    /// User-facing `filetype:` aliases, lowercase alias to media type.
    pub filetype_aliases: BTreeMap<String, String>,
    /// Whether `/regex/` delimited keyword values are honored at all.
    pub regex_enabled: bool,
    /// Automaton state budget handed to the backend regex query.
    pub regex_max_determinized_states: u32,
    /// Locale used for case folding in regex highlights; must match the
    /// locale of the backing ngram index.
    pub language_code: String,
    /// Time zone name attached to date-range queries for backend rounding.
    pub time_zone: String,
    pub allow_leading_wildcard: bool,
    /// Route multi-token phrase rescores through a token-count condition.
    pub token_count_router: bool,
    /// Upper bound on tokens in a routed phrase rescore; 0 disables the cap.
    pub max_phrase_tokens: usize,
    /// Depth bound for deep category expansion.
    pub deepcat_max_depth: u32,
    /// Result bound for deep category expansion.
    pub deepcat_max_categories: usize,
    /// `prefer-recent:` defaults when the user supplies no arguments.
    pub prefer_recent_decay: f64,
    pub prefer_recent_half_life_days: f64,
    /// Rescore window, in hits per shard, for the phrase-rescore query.
    pub phrase_rescore_window: u32,
    pub phrase_rescore_boost: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            weights: FieldWeights::default(),
            prefix_weights: PrefixWeights::default(),
            phrase_slop: PhraseSlop::default(),
            stemmed_weight: 0.5,
            near_match_weight: 2.0,
            max_wildcards: 3,
            max_keyword_conditions: 256,
            filetype_aliases: BTreeMap::new(),
            regex_enabled: false,
            regex_max_determinized_states: 20_000,
            language_code: "en".to_string(),
            time_zone: "UTC".to_string(),
            allow_leading_wildcard: true,
            token_count_router: false,
            max_phrase_tokens: 0,
            deepcat_max_depth: 5,
            deepcat_max_categories: 256,
            prefer_recent_decay: 0.6,
            prefer_recent_half_life_days: 160.0,
            phrase_rescore_window: 512,
            phrase_rescore_boost: 10.0,
        }
    }
}

/// Request-scoped parameters, supplied per compilation alongside the query
/// string itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    /// Restrict hits to these namespaces; `None` means no restriction.
    pub namespaces: Option<Vec<u32>>,
    pub offset: usize,
    pub limit: usize,
}
