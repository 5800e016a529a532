//! City model

use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// A populated place returned by the open-data city list
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct City {
    /// Display name, title-cased
    pub name: String,
    /// Country code (ISO 3166-1 alpha-2, upper case)
    pub country: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    pub population: u64,
}

impl City {
    #[must_use]
    pub fn new(name: String, country: String, point: GeoPoint, population: u64) -> Self {
        Self {
            name,
            country,
            latitude: point.latitude,
            longitude: point.longitude,
            population,
        }
    }

    #[must_use]
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Title-case a lower-case place name: `"san sebastian"` becomes `"San Sebastian"`.
///
/// Hyphens and apostrophes start a new word as well (`"l'hospitalet"` → `"L'Hospitalet"`).
#[must_use]
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
