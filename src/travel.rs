//! Travel time calculation from a fixed origin to a list of cities

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::config::TravelConfig;
use crate::google::MapsClient;
use crate::models::{City, CityTravel, Origin, RouteFailure, TravelBatch, TravelMode, TravelResult};
use crate::Result;

/// Runs one directions lookup per city and mode, strictly in order
pub struct TravelCalculator {
    maps: MapsClient,
    config: TravelConfig,
}

impl TravelCalculator {
    #[must_use]
    pub fn new(maps: MapsClient, config: TravelConfig) -> Self {
        Self { maps, config }
    }

    /// Driving (and optionally transit) routes from `origin` to every city.
    ///
    /// Missing routes are recorded in [`TravelBatch::failures`]; a city without
    /// a driving route leaves a `None` in the results. Any other error aborts.
    #[instrument(skip(self, origin, cities), fields(origin = %origin.address, cities = cities.len()))]
    pub async fn calculate(
        &self,
        origin: &Origin,
        cities: &[City],
        country_name: Option<&str>,
    ) -> Result<TravelBatch> {
        let start = Instant::now();
        let mut batch = TravelBatch::default();

        for (i, city) in cities.iter().enumerate() {
            let destination = self.destination_for(city, country_name);
            debug!(
                "[{}/{}] {} -> {}",
                i + 1,
                cities.len(),
                origin.address,
                destination
            );

            let Some(driving) = self
                .route(origin, city, &destination, TravelMode::Driving, &mut batch.failures)
                .await?
            else {
                batch.results.push(None);
                continue;
            };

            let transit = if self.config.include_transit {
                self.route(origin, city, &destination, TravelMode::Transit, &mut batch.failures)
                    .await?
            } else {
                None
            };

            batch.results.push(Some(CityTravel { driving, transit }));
        }

        info!(
            "Calculated routes for {}/{} cities in {:.3}s ({} failures)",
            batch.successful(),
            cities.len(),
            start.elapsed().as_secs_f64(),
            batch.failures.len()
        );
        Ok(batch)
    }

    /// Destination string sent to the directions API
    #[must_use]
    pub fn destination_for(&self, city: &City, country_name: Option<&str>) -> String {
        match country_name {
            Some(country) if self.config.destination_by_name => {
                format!("{}, {}", city.name, country)
            }
            _ => city.point().to_query(),
        }
    }

    async fn route(
        &self,
        origin: &Origin,
        city: &City,
        destination: &str,
        mode: TravelMode,
        failures: &mut Vec<RouteFailure>,
    ) -> Result<Option<TravelResult>> {
        match self.maps.directions(&origin.address, destination, mode).await {
            Ok(leg) => Ok(Some(TravelResult {
                origin: origin.address.clone(),
                destination: city.clone(),
                duration_s: leg.duration_s,
                distance_m: leg.distance_m,
                mode,
            })),
            Err(err) if err.is_recoverable() => {
                warn!("{}: {}", city.name, err);
                failures.push(RouteFailure {
                    city: city.name.clone(),
                    mode,
                    reason: err.to_string(),
                });
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn calculator(destination_by_name: bool) -> TravelCalculator {
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        TravelCalculator::new(
            MapsClient::new(client, "http://localhost", "test_api_key".to_string()),
            TravelConfig {
                include_transit: true,
                destination_by_name,
            },
        )
    }

    fn sevilla() -> City {
        City::new(
            "Sevilla".to_string(),
            "ES".to_string(),
            GeoPoint::new(37.3828, -5.9732).unwrap(),
            703_206,
        )
    }

    #[test]
    fn test_destination_by_coordinates() {
        let calc = calculator(false);
        assert_eq!(calc.destination_for(&sevilla(), Some("Spain")), "37.3828,-5.9732");
    }

    #[test]
    fn test_destination_by_name() {
        let calc = calculator(true);
        assert_eq!(calc.destination_for(&sevilla(), Some("Spain")), "Sevilla, Spain");
        // unknown country name falls back to coordinates
        assert_eq!(calc.destination_for(&sevilla(), None), "37.3828,-5.9732");
    }
}
