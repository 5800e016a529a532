//! Travel results produced by the directions lookups

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{City, GeoPoint};

/// Mode of transport sent to the directions API
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Transit,
}

impl TravelMode {
    /// Name used on the wire
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Transit => "transit",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starting point of every travel calculation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Origin {
    /// Address as given by the caller
    pub address: String,
    /// Geocoded position of the address
    pub point: GeoPoint,
}

/// Duration and distance of one route from the origin to a city
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TravelResult {
    pub origin: String,
    pub destination: City,
    /// Travel time in seconds
    pub duration_s: u64,
    /// Route length in meters
    pub distance_m: u64,
    pub mode: TravelMode,
}

/// Routes found for one city
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CityTravel {
    pub driving: TravelResult,
    pub transit: Option<TravelResult>,
}

impl CityTravel {
    /// Transit duration divided by driving duration.
    ///
    /// `None` when there is no transit route or the driving duration is zero.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        let transit = self.transit.as_ref()?;
        if self.driving.duration_s == 0 {
            return None;
        }
        Some(transit.duration_s as f64 / self.driving.duration_s as f64)
    }

    #[must_use]
    pub fn city(&self) -> &City {
        &self.driving.destination
    }
}

/// A route that could not be computed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RouteFailure {
    pub city: String,
    pub mode: TravelMode,
    pub reason: String,
}

/// Output of one travel calculation, aligned with the input cities
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TravelBatch {
    /// One entry per input city; `None` where no driving route exists
    pub results: Vec<Option<CityTravel>>,
    pub failures: Vec<RouteFailure>,
}

impl TravelBatch {
    /// Number of cities with at least a driving route
    #[must_use]
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(mode: TravelMode, duration_s: u64) -> TravelResult {
        let point = GeoPoint::new(41.6488, -0.8891).unwrap();
        TravelResult {
            origin: "Atocha, Madrid".to_string(),
            destination: City::new("Zaragoza".to_string(), "ES".to_string(), point, 674_317),
            duration_s,
            distance_m: 315_000,
            mode,
        }
    }

    #[test]
    fn test_ratio() {
        let travel = CityTravel {
            driving: result(TravelMode::Driving, 10_000),
            transit: Some(result(TravelMode::Transit, 5_000)),
        };
        assert_eq!(travel.ratio(), Some(0.5));
        assert_eq!(travel.city().name, "Zaragoza");
    }

    #[test]
    fn test_ratio_without_transit() {
        let travel = CityTravel {
            driving: result(TravelMode::Driving, 10_000),
            transit: None,
        };
        assert_eq!(travel.ratio(), None);
    }

    #[test]
    fn test_ratio_zero_driving_duration() {
        let travel = CityTravel {
            driving: result(TravelMode::Driving, 0),
            transit: Some(result(TravelMode::Transit, 60)),
        };
        assert_eq!(travel.ratio(), None);
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(TravelMode::Driving.to_string(), "driving");
        assert_eq!(serde_json::to_string(&TravelMode::Transit).unwrap(), "\"transit\"");
    }
}
