//! Escaping utilities for the backend's native query-string syntax.
//!
//! Every stage that hands user text to the backend goes through this module,
//! so the rules live in exactly one place:
//!
//! - [`escape_part`]: backslash-escape reserved operator characters in one
//!   token or phrase.
//! - [`balance_quotes`]: append a closing quote when the count is odd, so the
//!   backend parser never sees an unterminated phrase.
//! - [`fixup_whole`]: repair fuzzy (`~x`) and proximity (`"~x`) suffixes
//!   whose argument is not a valid fuzziness/slop, by escaping the tilde.
//! - [`fixup_dangling_operators`]: demote `AND`/`OR`/`NOT` words missing an
//!   operand into plain lowercase terms.
//! - [`is_valid_fuzziness`]: empty, a non-negative integer, or a float in
//!   `[0, 1]`.

use std::borrow::Cow;

/// Backslash-escape the reserved operator characters: `+ - / && || ! ( ) { }
/// [ ] ^ ? :` and backslash itself. Quotes, `*` and `~` are left alone; they
/// are handled by the phrase/wildcard/fuzzy passes.
pub fn escape_part(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '+' | '-' | '/' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '?' | ':' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '&' | '|' if chars.peek() == Some(&c) => {
                // && and || are operators only when doubled
                chars.next();
                out.push('\\');
                out.push(c);
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Append one trailing quote when the text contains an odd number of
/// unescaped quotes. Escaped quotes (`\"`) do not count.
pub fn balance_quotes(text: &str) -> Cow<'_, str> {
    let mut in_quote = false;
    let mut in_escape = false;
    for c in text.chars() {
        if in_escape {
            in_escape = false;
            continue;
        }
        match c {
            '"' => in_quote = !in_quote,
            '\\' => in_escape = true,
            _ => {}
        }
    }
    if in_quote { Cow::Owned(format!("{text}\"")) } else { Cow::Borrowed(text) }
}

/// Is `suffix` a fuzziness the backend accepts after `~`? Valid values are
/// the empty string, a non-negative integer, or a float between 0 and 1.
pub fn is_valid_fuzziness(suffix: &str) -> bool {
    if suffix.is_empty() {
        return true;
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    matches!(suffix.parse::<f64>(), Ok(v) if (0.0..=1.0).contains(&v))
}

/// Repair `~` suffixes over the whole joined query string.
///
/// `word~x` with an invalid fuzziness and `"~x` with a non-numeric slop both
/// get their tilde escaped instead of being rejected by the backend.
pub fn fixup_whole(text: &str) -> String {
    let fuzzy = crate::regex!(r#"([^\s"])~(\S+)"#);
    let text = fuzzy.replace_all(text, |caps: &regex::Captures<'_>| {
        let trailing = &caps[2];
        if is_valid_fuzziness(trailing) {
            caps[0].to_string()
        } else {
            format!("{}\\~{}", &caps[1], trailing)
        }
    });
    let proximity = crate::regex!(r#""~(\S*)"#);
    proximity
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let trailing = &caps[1];
            if !trailing.is_empty() && trailing.chars().all(|c| c.is_ascii_digit()) {
                caps[0].to_string()
            } else {
                format!("\"\\~{trailing}")
            }
        })
        .into_owned()
}

/// Demote boolean operator words that lack an operand into plain terms by
/// lowercasing them. `AND` and `OR` need a term on each side, `NOT` a term
/// after it. `&&` and `||` never reach this point; [`escape_part`] escapes
/// them unconditionally.
pub fn fixup_dangling_operators(text: &str) -> String {
    // an operator at the very end has no right operand
    let trailing = crate::regex!(r"(^|\s)(AND|OR|NOT)(\s*)$");
    let text = trailing.replace(text, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps[1], caps[2].to_lowercase(), &caps[3])
    });
    // of two operators in a row the latter wins, the former becomes a term
    let paired = crate::regex!(r"(^|\s)(AND|OR|NOT)(\s+)((?:AND|OR|NOT)(?:\s|$))");
    let text = paired.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("{}{}{}{}", &caps[1], caps[2].to_lowercase(), &caps[3], &caps[4])
    });
    // a leading AND or OR has no left operand; a leading NOT is valid
    let leading = crate::regex!(r"^(\s*)(AND|OR)(\s|$)");
    leading
        .replace(&text, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], caps[2].to_lowercase(), &caps[3])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape_part("a+b"), "a\\+b");
        assert_eq!(escape_part("path/to:x"), "path\\/to\\:x");
        assert_eq!(escape_part("(a)[b]{c}^2"), "\\(a\\)\\[b\\]\\{c\\}\\^2");
        assert_eq!(escape_part("a\\b"), "a\\\\b");
        assert_eq!(escape_part("a&&b"), "a\\&\\&b");
        assert_eq!(escape_part("a||b"), "a\\|\\|b");
        // single & and | are not operators
        assert_eq!(escape_part("a&b|c"), "a&b|c");
        // quotes, wildcards and tildes pass through
        assert_eq!(escape_part("\"a*b~\""), "\"a*b~\"");
    }

    #[test]
    fn balances_odd_quotes() {
        assert_eq!(balance_quotes("\"foo"), "\"foo\"");
        assert_eq!(balance_quotes("\"foo\" bar"), "\"foo\" bar");
        assert_eq!(balance_quotes("plain"), "plain");
        // escaped quote does not open a phrase
        assert_eq!(balance_quotes(r#"a\"b"#), r#"a\"b"#);
    }

    #[test]
    fn fuzziness_validation() {
        assert!(is_valid_fuzziness(""));
        assert!(is_valid_fuzziness("2"));
        assert!(is_valid_fuzziness("0.8"));
        assert!(is_valid_fuzziness(".5"));
        assert!(is_valid_fuzziness("1.0"));
        assert!(!is_valid_fuzziness("1.5"));
        assert!(!is_valid_fuzziness("bar"));
        assert!(!is_valid_fuzziness("-1"));
    }

    #[test]
    fn repairs_bad_fuzzy_suffixes() {
        assert_eq!(fixup_whole("word~2"), "word~2");
        assert_eq!(fixup_whole("word~bar"), "word\\~bar");
        assert_eq!(fixup_whole("\"a b\"~3"), "\"a b\"~3");
        assert_eq!(fixup_whole("\"a b\"~x"), "\"a b\"\\~x");
    }

    #[test]
    fn dangling_operators_are_lowercased() {
        assert_eq!(fixup_dangling_operators("SOMETHING AND "), "SOMETHING and ");
        assert_eq!(fixup_dangling_operators("SOMETHING AND OR"), "SOMETHING AND or");
        assert_eq!(fixup_dangling_operators("X OR"), "X or");
        assert_eq!(fixup_dangling_operators("WHAT NOT"), "WHAT not");
        assert_eq!(fixup_dangling_operators("Q NOT NOT"), "Q NOT not");
        assert_eq!(fixup_dangling_operators("Q NOT NOT Q"), "Q not NOT Q");
        assert_eq!(fixup_dangling_operators("OR WHAT NOW"), "or WHAT NOW");
        assert_eq!(fixup_dangling_operators(" AND WHAT NOW"), " and WHAT NOW");
        assert_eq!(fixup_dangling_operators("AND OR WHAT NOW"), "and OR WHAT NOW");
    }

    #[test]
    fn well_formed_operators_and_plain_words_pass_through() {
        assert_eq!(fixup_dangling_operators("YOU AND ME"), "YOU AND ME");
        assert_eq!(fixup_dangling_operators("YOU OR ME"), "YOU OR ME");
        assert_eq!(fixup_dangling_operators("BAND OR X"), "BAND OR X");
        assert_eq!(fixup_dangling_operators("Z OR ANDS Z"), "Z OR ANDS Z");
        assert_eq!(fixup_dangling_operators("NOT ME"), "NOT ME");
        assert_eq!(fixup_dangling_operators("BAND"), "BAND");
        assert_eq!(fixup_dangling_operators("NOTME"), "NOTME");
        assert_eq!(fixup_dangling_operators("ANDERSON"), "ANDERSON");
    }
}
