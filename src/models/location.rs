//! Geographic point model and coordinate helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TransitRatioError;

/// A point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point, rejecting out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(TransitRatioError::validation(format!(
                "Latitude must be between -90 and 90, got: {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(TransitRatioError::validation(format!(
                "Longitude must be between -180 and 180, got: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to another point in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine::distance(
            haversine::Location {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            haversine::Location {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            haversine::Units::Kilometers,
        )
    }

    /// Format as the `lat,lon` pair the directions API accepts
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_coordinates())
    }
}

/// Parses the open-data geopoint format `"lat, lon"`
impl FromStr for GeoPoint {
    type Err = TransitRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(TransitRatioError::validation(format!(
                "Geopoint must be in format 'lat,lon', got: '{s}'"
            )));
        }

        let lat = parts[0]
            .parse::<f64>()
            .map_err(|_| TransitRatioError::validation(format!("Invalid latitude: {}", parts[0])))?;
        let lon = parts[1]
            .parse::<f64>()
            .map_err(|_| TransitRatioError::validation(format!("Invalid longitude: {}", parts[1])))?;

        GeoPoint::new(lat, lon)
    }
}
