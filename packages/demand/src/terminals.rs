//! Airport terminal seeds.
//!
//! Each `aeroway=terminal` place becomes its own seed. Terminals are
//! grouped under a key (an IATA/ICAO code or an airport name) that drives
//! both display naming and the per-airport traffic caps.

use std::collections::BTreeMap;

use geo::Point;
use transit_demand_models::OsmElement;
use transit_demand_spatial::GeometryOps;

use crate::seeds::Seed;

/// Aerodromes farther than this from a terminal are not used to name it.
pub const AERODROME_SEARCH_KM: f64 = 80.0;

/// Radius around a terminal whose residential buildings are treated as
/// covered.
pub const TERMINAL_COVER_KM: f64 = 1.2;

const FALLBACK_KEY: &str = "Airport";

fn code(element: &OsmElement) -> Option<&str> {
    element
        .tag("iata")
        .or_else(|| element.tag("icao"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

fn name(element: &OsmElement) -> Option<&str> {
    element.tag("name").map(str::trim).filter(|n| !n.is_empty())
}

/// The aerodrome nearest to `center`, if one lies within
/// [`AERODROME_SEARCH_KM`].
fn nearest_aerodrome<'a>(
    center: Point<f64>,
    aerodromes: &[&'a OsmElement],
    geometry: &dyn GeometryOps,
) -> Option<&'a OsmElement> {
    aerodromes
        .iter()
        .filter_map(|aerodrome| {
            let (lon, lat) = aerodrome.center()?;
            let distance = geometry.distance_km(center, Point::new(lon, lat));
            (distance <= AERODROME_SEARCH_KM).then_some((distance, *aerodrome))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)))
        .map(|(_, aerodrome)| aerodrome)
}

/// Grouping key for a terminal.
///
/// Resolution order: own code, nearest aerodrome's code, nearest
/// aerodrome's name, own name, then `"Airport"`.
#[must_use]
pub fn terminal_key(
    terminal: &OsmElement,
    center: Point<f64>,
    aerodromes: &[&OsmElement],
    geometry: &dyn GeometryOps,
) -> String {
    if let Some(own) = code(terminal) {
        return own.to_string();
    }

    let aerodrome = nearest_aerodrome(center, aerodromes, geometry);
    aerodrome
        .and_then(code)
        .or_else(|| aerodrome.and_then(name))
        .or_else(|| name(terminal))
        .unwrap_or(FALLBACK_KEY)
        .to_string()
}

/// Builds one seed per terminal, named `"<key> Terminal <n>"` with `n`
/// counting up per key in input order.
///
/// Terminals without a usable center are skipped.
#[must_use]
pub fn terminal_seeds(
    terminals: &[&OsmElement],
    aerodromes: &[&OsmElement],
    geometry: &dyn GeometryOps,
) -> Vec<Seed> {
    let mut sequence: BTreeMap<String, usize> = BTreeMap::new();
    let mut seeds = Vec::with_capacity(terminals.len());

    for terminal in terminals {
        let Some((lon, lat)) = terminal.center() else {
            log::warn!("Terminal {} has no location, skipping", terminal.id);
            continue;
        };
        let location = Point::new(lon, lat);
        let key = terminal_key(terminal, location, aerodromes, geometry);

        let n = sequence.entry(key.clone()).or_insert(0);
        *n += 1;
        let display = format!("{key} Terminal {n}");
        log::debug!("Terminal {} -> {display}", terminal.id);

        seeds.push(Seed {
            id: terminal.id.to_string(),
            location,
            name: Some(display),
            synthetic: false,
            terminal: Some(key),
        });
    }

    seeds
}
