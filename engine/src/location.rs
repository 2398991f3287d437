//! Location handling
//!
//! One keyword classifier decides whether a turn is location-sensitive and
//! whether it asks for the *nearest* outlets. The planner (hint injection and
//! coordinate backfill) and the outlet adapter (nearest routing) share it, so
//! the keyword sets cannot drift apart.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Words that make a turn location-sensitive
const LOCATION_KEYWORDS: &[&str] = &[
    "near",
    "nearest",
    "closest",
    "nearby",
    "close to me",
    "around me",
    "outlet",
    "outlets",
    "location",
    "locations",
    "branch",
    "branches",
    "store",
    "stores",
];

/// Words that ask for distance-ranked results
const NEAREST_KEYWORDS: &[&str] = &[
    "nearest",
    "closest",
    "near me",
    "nearby",
    "close to me",
    "around me",
];

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Read a coordinate from a `{latitude, longitude}` JSON object
    pub fn from_value(value: &Value) -> Option<Self> {
        let latitude = value.get("latitude")?.as_f64()?;
        let longitude = value.get("longitude")?.as_f64()?;
        Self::new(latitude, longitude)
    }

    pub fn to_value(self) -> Value {
        json!({ "latitude": self.latitude, "longitude": self.longitude })
    }

    /// The machine-readable hint line appended to location-sensitive turns
    pub fn hint_line(&self) -> String {
        format!(
            "\nUser's GPS Location Available: (Latitude {}, Longitude {})",
            self.latitude, self.longitude
        )
    }
}

/// Keyword classifier for location-sensitive turns
#[derive(Debug, Clone)]
pub struct LocationClassifier {
    location: Regex,
    nearest: Regex,
}

impl LocationClassifier {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            location: keyword_pattern(LOCATION_KEYWORDS)?,
            nearest: keyword_pattern(NEAREST_KEYWORDS)?,
        })
    }

    /// Whether the text concerns a place, so stored GPS context may be used
    pub fn is_location_sensitive(&self, text: &str) -> bool {
        self.location.is_match(text)
    }

    /// Whether the text asks for distance-ranked results
    pub fn is_nearest(&self, text: &str) -> bool {
        self.nearest.is_match(text)
    }
}

fn keyword_pattern(keywords: &[&str]) -> anyhow::Result<Regex> {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))?)
}

/// Great-circle distance in kilometres (haversine)
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Round to two decimal places
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Rank items by distance from `origin`, nearest first, keeping at most `limit`.
///
/// Distances are rounded to two decimals. Ties keep their input order.
pub fn rank_nearest<T>(origin: Coordinate, items: Vec<(T, Coordinate)>, limit: usize) -> Vec<(T, f64)> {
    let mut ranked: Vec<(T, f64)> = items
        .into_iter()
        .map(|(item, at)| (item, haversine_km(origin, at)))
        .collect();

    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(item, km)| (item, round_km(km)))
        .collect()
}
