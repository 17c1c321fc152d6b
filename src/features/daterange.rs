//! Date-range keywords (`lasteditdate:` by default).
//!
//! Values carry an optional comparison prefix and a date that is either
//! relative (`now`, `today`, `now-3d`) or a calendar literal (`2024`,
//! `2024-03`, `2024-03-05`). Output is a backend date-math range:
//!
//! ```text
//! lasteditdate:>=2024-03     range gte "2024-03||/M"  format year_month
//! lasteditdate:now-1d        range eq  "now-1d/d"
//! lasteditdate:2024-03-05    range eq  "2024-03-05||/d"
//! ```
//!
//! Equality sets both bounds to the same rounded expression; the backend's
//! rounding rules turn that into the enclosing interval. Literals are
//! validated by a chrono round-trip so `2024-15` or `2024-02-30` never reach
//! the backend; invalid values reject the whole query with a warning.

use chrono::NaiveDate;

use crate::context::{CompilationContext, WarningCollector};
use crate::query::{Query, RangeParams, RangeValue};

use super::{Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRangeValue {
    pub condition: DateCondition,
    /// Full date-math expression, rounding suffix included.
    pub expr: String,
    /// Named bound format for calendar literals; relative expressions carry
    /// none.
    pub format: Option<&'static str>,
}

pub struct DateRangeFeature {
    spec: KeywordSpec,
    field: &'static str,
}

impl DateRangeFeature {
    pub fn last_edit_date() -> Self {
        DateRangeFeature {
            spec: KeywordSpec::simple("lasteditdate", &["lasteditdate"]),
            field: "timestamp",
        }
    }
}

impl KeywordFeature for DateRangeFeature {
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
        let value = value.trim();
        let (condition, date) = split_condition(value);
        let (expr, format) = parse_date(date.trim())?;
        Some(ParsedValue::Date(DateRangeValue { condition, expr, format }))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        key: &str,
        parsed: Option<&ParsedValue>,
        _negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Date(value)) = parsed else {
            ctx.add_warning("invalid-date-range", &[key]);
            ctx.disable_results();
            return (None, false);
        };
        let bound = RangeValue::Str(value.expr.clone());
        let mut params = RangeParams {
            format: value.format.map(|f| f.to_string()),
            time_zone: Some(ctx.config().time_zone.clone()),
            ..RangeParams::default()
        };
        match value.condition {
            DateCondition::Eq => {
                params.gte = Some(bound.clone());
                params.lte = Some(bound);
            }
            DateCondition::Lt => params.lt = Some(bound),
            DateCondition::Lte => params.lte = Some(bound),
            DateCondition::Gt => params.gt = Some(bound),
            DateCondition::Gte => params.gte = Some(bound),
        }
        (Some(Query::Range { field: self.field.to_string(), params }), false)
    }
}

fn split_condition(value: &str) -> (DateCondition, &str) {
    for (prefix, condition) in [
        ("<=", DateCondition::Lte),
        (">=", DateCondition::Gte),
        ("<", DateCondition::Lt),
        (">", DateCondition::Gt),
    ] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return (condition, rest);
        }
    }
    (DateCondition::Eq, value)
}

/// Turn one date token into a rounded date-math expression. `None` means
/// the token is not a date at all.
fn parse_date(date: &str) -> Option<(String, Option<&'static str>)> {
    if let Some(rest) = date.strip_prefix("now") {
        return relative(rest, 'h');
    }
    if let Some(rest) = date.strip_prefix("today") {
        return relative(rest, 'd');
    }
    literal(date)
}

fn relative(offset: &str, base_precision: char) -> Option<(String, Option<&'static str>)> {
    if offset.is_empty() {
        return Some((format!("now/{base_precision}"), None));
    }
    let caps = crate::regex!(r"^-(\d+)([ymdh])$").captures(offset)?;
    let amount = &caps[1];
    // lowercase m is months here, matching the comparison-value grammar
    let unit = match &caps[2] {
        "m" => "M",
        other => other,
    };
    Some((format!("now-{amount}{unit}/{unit}"), None))
}

fn literal(date: &str) -> Option<(String, Option<&'static str>)> {
    if crate::regex!(r"^\d{4}$").is_match(date) {
        return Some((format!("{date}||/y"), Some("year")));
    }
    if crate::regex!(r"^\d{4}-\d{2}$").is_match(date) {
        let year: i32 = date[..4].parse().ok()?;
        let month: u32 = date[5..].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)?;
        return Some((format!("{date}||/M"), Some("year_month")));
    }
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    // round-trip to reject unpadded forms the backend would misread
    if parsed.format("%Y-%m-%d").to_string() != date {
        return None;
    }
    Some((format!("{date}||/d"), Some("year_month_day")))
}
