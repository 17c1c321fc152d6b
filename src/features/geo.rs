//! Geographic keywords: `nearcoord:`, `neartitle:` and their `boost-`
//! variants.
//!
//! Value grammar is `[radius,]lat,lon` for the coordinate forms and
//! `[radius,]Title` for the title forms. The plain keywords produce a hard
//! distance filter; the `boost-` keywords only record a scored proximity
//! boost and can never make the query impossible. Unparsable values
//! contribute nothing at all.

use std::sync::Arc;

use crate::context::{CompilationContext, GeoBoost, WarningCollector};
use crate::query::{BoolQuery, Coord, Query};
use crate::resolve::TitleResolver;

use super::{resolver_miss, Delimiter, KeywordFeature, KeywordSpec, ParsedValue};

const DEFAULT_RADIUS_METERS: u32 = 5000;
const MIN_RADIUS_METERS: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum GeoTarget {
    Coord(Coord),
    Title(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoValue {
    pub radius_meters: u32,
    pub target: GeoTarget,
}

pub struct GeoFeature {
    spec: KeywordSpec,
    by_title: bool,
    boost_only: bool,
    resolver: Arc<dyn TitleResolver>,
}

impl GeoFeature {
    pub fn near_coord() -> Self {
        // the coordinate forms never consult the resolver
        GeoFeature {
            spec: KeywordSpec::simple("nearcoord", &["nearcoord"]),
            by_title: false,
            boost_only: false,
            resolver: Arc::new(crate::resolve::NoopResolver),
        }
    }

    pub fn boost_near_coord() -> Self {
        GeoFeature {
            spec: KeywordSpec::simple("boost-nearcoord", &["boost-nearcoord"]),
            by_title: false,
            boost_only: true,
            resolver: Arc::new(crate::resolve::NoopResolver),
        }
    }

    pub fn near_title(resolver: Arc<dyn TitleResolver>) -> Self {
        GeoFeature {
            spec: KeywordSpec::simple("neartitle", &["neartitle"]),
            by_title: true,
            boost_only: false,
            resolver,
        }
    }

    pub fn boost_near_title(resolver: Arc<dyn TitleResolver>) -> Self {
        GeoFeature {
            spec: KeywordSpec::simple("boost-neartitle", &["boost-neartitle"]),
            by_title: true,
            boost_only: true,
            resolver,
        }
    }

    /// Resolve the target into coordinates, plus the page id to exclude
    /// when the target was a title.
    fn locate(
        &self,
        ctx: &mut CompilationContext<'_>,
        target: &GeoTarget,
    ) -> Option<(Coord, Option<u64>)> {
        match target {
            GeoTarget::Coord(coord) => Some((*coord, None)),
            GeoTarget::Title(title) => match self.resolver.resolve_title(title) {
                Ok(resolved) => resolved.coord.map(|c| (c, Some(resolved.page_id))),
                Err(err) => {
                    resolver_miss(ctx, err);
                    None
                }
            },
        }
    }
}

impl KeywordFeature for GeoFeature {
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
        let (radius_meters, rest) = split_radius(value);
        let target = if self.by_title {
            let title = rest.trim();
            if title.is_empty() {
                return None;
            }
            GeoTarget::Title(title.to_string())
        } else {
            GeoTarget::Coord(parse_coord(rest)?)
        };
        Some(ParsedValue::Geo(GeoValue { radius_meters, target }))
    }

    fn apply(
        &self,
        ctx: &mut CompilationContext<'_>,
        _key: &str,
        parsed: Option<&ParsedValue>,
        negated: bool,
    ) -> (Option<Query>, bool) {
        let Some(ParsedValue::Geo(value)) = parsed else {
            return (None, false);
        };
        let Some((coord, exclude_page_id)) = self.locate(ctx, &value.target) else {
            return (None, false);
        };
        if self.boost_only {
            ctx.add_geo_boost(GeoBoost {
                coord,
                radius_meters: value.radius_meters,
                weight: if negated { 0.1 } else { 1.0 },
            });
            return (None, false);
        }
        let distance = Query::Nested {
            path: "coordinates".to_string(),
            query: Box::new(Query::GeoDistance {
                field: "coordinates.coord".to_string(),
                lat: coord.lat,
                lon: coord.lon,
                distance: format!("{}m", value.radius_meters),
            }),
        };
        let filter = match exclude_page_id {
            Some(page_id) => Query::Bool(BoolQuery {
                filter: vec![distance],
                must_not: vec![Query::term("page_id", page_id.to_string())],
                ..BoolQuery::default()
            }),
            None => distance,
        };
        (Some(filter), false)
    }
}

/// Pull an optional leading `<digits><unit>,` radius off the value.
fn split_radius(value: &str) -> (u32, &str) {
    let pattern = crate::regex!(r"^(\d+)(m|km|mi|ft|yd)\s*,\s*");
    let Some(caps) = pattern.captures(value) else {
        return (DEFAULT_RADIUS_METERS, value);
    };
    let Ok(amount) = caps[1].parse::<f64>() else {
        return (DEFAULT_RADIUS_METERS, value);
    };
    let scale = match &caps[2] {
        "m" => 1.0,
        "km" => 1000.0,
        "mi" => 1609.344,
        "ft" => 0.3048,
        _ => 0.9144,
    };
    let meters = (amount * scale).round() as u32;
    let rest = &value[caps.get(0).map_or(0, |m| m.end())..];
    (meters.max(MIN_RADIUS_METERS), rest)
}

fn parse_coord(text: &str) -> Option<Coord> {
    let mut parts = text.split(',');
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    let lon: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(Coord { lat, lon })
}
