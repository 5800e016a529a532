//! Maps API client for geocoding and directions
//!
//! Talks to the Google Maps web service JSON endpoints (or anything serving the
//! same shape under a configurable base URL). Both endpoints share one API key.

use std::time::Instant;

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::http::{self, FetchError};
use crate::models::{GeoPoint, TravelMode};
use crate::{Result, TransitRatioError};

const GEOCODE_PATH: &str = "/maps/api/geocode/json";
const DIRECTIONS_PATH: &str = "/maps/api/directions/json";

/// Distance and duration of the first leg of the first route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLeg {
    pub distance_m: u64,
    pub duration_s: u64,
}

/// Geocoding and directions client
#[derive(Clone)]
pub struct MapsClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl MapsClient {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Position of the best match for `address`, `None` when nothing matches
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        info!("Geocoding '{}'", address);
        let start = Instant::now();

        let url = format!(
            "{}{}?address={}&key={}",
            self.base_url,
            GEOCODE_PATH,
            urlencoding::encode(address),
            urlencoding::encode(&self.api_key)
        );

        let response: openapi::GeocodeResponse = self.get_json(&url).await?;

        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" | "NOT_FOUND" => {
                warn!("No geocoding results for '{}'", address);
                return Ok(None);
            }
            status => return Err(status_error(status, response.error_message)),
        }

        let Some(first) = response.results.into_iter().next() else {
            warn!("Geocoding for '{}' returned OK without results", address);
            return Ok(None);
        };

        let location = first.geometry.location;
        let point = GeoPoint::new(location.lat, location.lng)
            .map_err(|e| TransitRatioError::api(format!("Geocoder returned {e}")))?;

        debug!(
            "Geocoded '{}' to {} in {:.3}s",
            address,
            point,
            start.elapsed().as_secs_f64()
        );
        Ok(Some(point))
    }

    /// Route from `origin` to `destination` in `mode`.
    ///
    /// Fails with `RouteNotFound` when the API has no route for the pair.
    #[instrument(skip(self))]
    pub async fn directions(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
    ) -> Result<RouteLeg> {
        let url = format!(
            "{}{}?origin={}&destination={}&mode={}&key={}",
            self.base_url,
            DIRECTIONS_PATH,
            urlencoding::encode(origin),
            urlencoding::encode(destination),
            mode.as_str(),
            urlencoding::encode(&self.api_key)
        );

        let response: openapi::DirectionsResponse = self.get_json(&url).await?;

        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" | "NOT_FOUND" | "MAX_ROUTE_LENGTH_EXCEEDED" => {
                return Err(TransitRatioError::route_not_found(destination, mode));
            }
            status => return Err(status_error(status, response.error_message)),
        }

        let leg = response
            .routes
            .into_iter()
            .next()
            .and_then(|route| route.legs.into_iter().next())
            .and_then(|leg| Some((leg.distance?, leg.duration?)));

        match leg {
            Some((distance, duration)) => Ok(RouteLeg {
                distance_m: distance.value,
                duration_s: duration.value,
            }),
            None => Err(TransitRatioError::route_not_found(destination, mode)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = http::fetch(&self.client, url).await.map_err(|e| match e {
            e if e.is_unauthorized() => {
                error!("Maps API authentication failed: {}", e);
                TransitRatioError::authentication(e.to_string())
            }
            FetchError::Transport(message) => TransitRatioError::api(message),
            e @ FetchError::Status(..) => TransitRatioError::api(e.to_string()),
        })?;

        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse maps API response: {}", e);
            TransitRatioError::api(format!("Invalid response from maps API: {e}"))
        })
    }
}

/// Map a non-OK `status` field onto an error
fn status_error(status: &str, message: Option<String>) -> TransitRatioError {
    let detail = message.unwrap_or_else(|| status.to_string());
    match status {
        "REQUEST_DENIED" => TransitRatioError::authentication(detail),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
            TransitRatioError::api(format!("Maps API quota exceeded: {detail}"))
        }
        _ => TransitRatioError::api(format!("Maps API returned {status}: {detail}")),
    }
}

/// Maps API response structures
mod openapi {
    use super::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct GeocodeResponse {
        pub status: String,
        #[serde(default)]
        pub results: Vec<GeocodeResult>,
        pub error_message: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodeResult {
        pub geometry: Geometry,
    }

    #[derive(Debug, Deserialize)]
    pub struct Geometry {
        pub location: LatLng,
    }

    #[derive(Debug, Deserialize)]
    pub struct LatLng {
        pub lat: f64,
        pub lng: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct DirectionsResponse {
        pub status: String,
        #[serde(default)]
        pub routes: Vec<Route>,
        pub error_message: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Route {
        #[serde(default)]
        pub legs: Vec<Leg>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Leg {
        pub distance: Option<TextValue>,
        pub duration: Option<TextValue>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TextValue {
        pub value: u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error("REQUEST_DENIED", Some("The provided API key is invalid.".into())),
            TransitRatioError::Authentication { .. }
        ));
        assert!(matches!(
            status_error("OVER_QUERY_LIMIT", None),
            TransitRatioError::Api { .. }
        ));
        let err = status_error("INVALID_REQUEST", None);
        assert!(err.to_string().contains("INVALID_REQUEST"));
    }

    #[test]
    fn test_directions_response_parsing() {
        let body = json!({
            "status": "OK",
            "routes": [{
                "legs": [{
                    "distance": {"text": "315 km", "value": 315_214},
                    "duration": {"text": "3 hours 5 mins", "value": 11_112}
                }]
            }]
        });
        let parsed: openapi::DirectionsResponse = serde_json::from_value(body).unwrap();
        let leg = &parsed.routes[0].legs[0];
        assert_eq!(leg.distance.as_ref().unwrap().value, 315_214);
        assert_eq!(leg.duration.as_ref().unwrap().value, 11_112);
    }

    #[test]
    fn test_zero_results_parsing() {
        let parsed: openapi::DirectionsResponse =
            serde_json::from_value(json!({"status": "ZERO_RESULTS", "routes": []})).unwrap();
        assert_eq!(parsed.status, "ZERO_RESULTS");
        assert!(parsed.routes.is_empty());

        let parsed: openapi::GeocodeResponse =
            serde_json::from_value(json!({"status": "ZERO_RESULTS"})).unwrap();
        assert!(parsed.results.is_empty());
    }
}
