//! Numeric file-property keywords: `filesize:`, `filebits:`, `fileh:`,
//! `filew:`, `fileheight:`, `filewidth:` and `fileres:`.
//!
//! Grammar: an optional `>` or `<` sign, or an `a,b` inclusive range, over
//! one or two numbers. `filesize:` is special twice over: bare values mean
//! "at least" rather than "exactly", and values are given in kilobytes.
//! A sign combined with a range, or anything non-numeric, rejects the
//! query with a warning.

use crate::context::{CompilationContext, WarningCollector};
use crate::query::{Query, RangeParams, RangeValue};

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericSign {
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    /// Bare value, kept verbatim for an exact match.
    Eq { raw: String },
    Cmp { sign: NumericSign, value: f64 },
    Range { low: f64, high: f64 },
}

pub struct FileNumericFeature {
    spec: KeywordSpec,
    field: &'static str,
    /// Scale applied to parsed numbers (1024 for kilobyte-denominated
    /// `filesize:`).
    multiplier: f64,
    /// Treat a bare value as a lower bound instead of an exact match.
    bare_is_lower_bound: bool,
}

impl FileNumericFeature {
    pub fn file_size() -> Self {
        FileNumericFeature {
            spec: KeywordSpec::simple("filesize", &["filesize"]),
            field: "file_size",
            multiplier: 1024.0,
            bare_is_lower_bound: true,
        }
    }

    pub fn file_bits() -> Self {
        Self::plain("filebits", &["filebits"], "file_bits")
    }

    pub fn file_height() -> Self {
        Self::plain("fileheight", &["fileh", "fileheight"], "file_height")
    }

    pub fn file_width() -> Self {
        Self::plain("filewidth", &["filew", "filewidth"], "file_width")
    }

    pub fn file_resolution() -> Self {
        Self::plain("fileres", &["fileres"], "file_resolution")
    }

    fn plain(name: &'static str, keywords: &'static [&'static str], field: &'static str) -> Self {
        FileNumericFeature {
            spec: KeywordSpec::simple(name, keywords),
            field,
            multiplier: 1.0,
            bare_is_lower_bound: false,
        }
    }
}

impl KeywordFeature for FileNumericFeature {
    fn spec(&self) -> &KeywordSpec {
        &self.spec
    }

    fn parse_value(
        &self,
        key: &str,
        value: &str,
        _quoted_value: &str,
        _delimiter: Delimiter,
        _suffix: &str,
        warnings: &mut dyn WarningCollector,
    ) -> Option<ParsedValue> {
        let value = value.trim();
        let (sign, rest) = match value.as_bytes().first() {
            Some(b'>') => (Some(NumericSign::Gt), &value[1..]),
            Some(b'<') => (Some(NumericSign::Lt), &value[1..]),
            _ => (None, value),
        };
        if let Some((low, high)) = rest.split_once(',') {
            if sign.is_some() {
                warnings.add_warning("invalid-numeric-range", &[key, value]);
                return None;
            }
            let low = parse_number(low, key, warnings)? * self.multiplier;
            let high = parse_number(high, key, warnings)? * self.multiplier;
            return Some(ParsedValue::Numeric(NumericValue::Range { low, high }));
        }
        let number = parse_number(rest, key, warnings)?;
        let parsed = match sign {
            Some(sign) => NumericValue::Cmp { sign, value: number * self.multiplier },
            None if self.bare_is_lower_bound => {
                NumericValue::Cmp { sign: NumericSign::Gt, value: number * self.multiplier }
            }
            None => NumericValue::Eq { raw: rest.to_string() },
        };
        Some(ParsedValue::Numeric(parsed))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Numeric(value)) = parsed else {
            ctx.disable_results();
            return (None, false);
        };
        let filter = match value {
            NumericValue::Eq { raw } => Query::match_field(self.field, raw.clone()),
            NumericValue::Cmp { sign, value } => {
                let mut params = RangeParams::default();
                match sign {
                    NumericSign::Lt => params.lt = Some(RangeValue::Num(*value)),
                    NumericSign::Gt if self.bare_is_lower_bound => {
                        params.gte = Some(RangeValue::Num(*value))
                    }
                    NumericSign::Gt => params.gt = Some(RangeValue::Num(*value)),
                }
                Query::Range { field: self.field.to_string(), params }
            }
            NumericValue::Range { low, high } => Query::Range {
                field: self.field.to_string(),
                params: RangeParams {
                    gte: Some(RangeValue::Num(*low)),
                    lte: Some(RangeValue::Num(*high)),
                    ..RangeParams::default()
                },
            },
        };
        (Some(filter), false)
    }
}

fn parse_number(text: &str, key: &str, warnings: &mut dyn WarningCollector) -> Option<f64> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            warnings.add_warning("not-a-number", &[key, text]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::context::Warning;

    fn parse(feature: &FileNumericFeature, value: &str) -> (Option<ParsedValue>, Vec<Warning>) {
        let mut warnings = Vec::new();
        let parsed = feature.parse_value(
            feature.spec().keywords[0],
            value,
            value,
            Delimiter::Bare,
            "",
            &mut warnings,
        );
        (parsed, warnings)
    }

    #[test]
    fn bare_filesize_is_a_kilobyte_lower_bound() {
        let feature = FileNumericFeature::file_size();
        let (parsed, warnings) = parse(&feature, "20");
        assert!(warnings.is_empty());
        assert_eq!(
            parsed,
            Some(ParsedValue::Numeric(NumericValue::Cmp {
                sign: NumericSign::Gt,
                value: 20480.0,
            }))
        );
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let (filter, _) = feature.apply(&mut ctx, "filesize", parsed.as_ref(), false);
        match filter {
            Some(Query::Range { field, params }) => {
                assert_eq!(field, "file_size");
                // bare filesize means "at least", so the bound is inclusive
                assert_eq!(params.gte, Some(RangeValue::Num(20480.0)));
                assert_eq!(params.gt, None);
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn bare_width_is_an_exact_match() {
        let feature = FileNumericFeature::file_width();
        let (parsed, _) = parse(&feature, "800");
        assert_eq!(parsed, Some(ParsedValue::Numeric(NumericValue::Eq { raw: "800".to_string() })));
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let (filter, _) = feature.apply(&mut ctx, "filew", parsed.as_ref(), false);
        assert_eq!(filter, Some(Query::match_field("file_width", "800")));
    }

    #[test]
    fn signed_comparisons_are_exclusive() {
        let feature = FileNumericFeature::file_height();
        let (parsed, _) = parse(&feature, ">600");
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let (filter, _) = feature.apply(&mut ctx, "fileh", parsed.as_ref(), false);
        match filter {
            Some(Query::Range { params, .. }) => {
                assert_eq!(params.gt, Some(RangeValue::Num(600.0)));
                assert_eq!(params.gte, None);
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn comma_pair_is_an_inclusive_range() {
        let feature = FileNumericFeature::file_resolution();
        let (parsed, warnings) = parse(&feature, "100,200");
        assert!(warnings.is_empty());
        assert_eq!(
            parsed,
            Some(ParsedValue::Numeric(NumericValue::Range { low: 100.0, high: 200.0 }))
        );
    }

    #[test]
    fn sign_with_range_warns_and_rejects() {
        let feature = FileNumericFeature::file_size();
        let (parsed, warnings) = parse(&feature, ">100,200");
        assert_eq!(parsed, None);
        assert_eq!(warnings[0].code, "invalid-numeric-range");
    }

    #[test]
    fn non_numeric_value_warns_and_disables_results() {
        let feature = FileNumericFeature::file_bits();
        let (parsed, warnings) = parse(&feature, "large");
        assert_eq!(parsed, None);
        assert_eq!(warnings[0].code, "not-a-number");
        let config = SearchConfig::default();
        let mut ctx = CompilationContext::new(&config, None);
        let (filter, _) = feature.apply(&mut ctx, "filebits", None, false);
        assert_eq!(filter, None);
        assert!(!ctx.results_possible());
    }
}
