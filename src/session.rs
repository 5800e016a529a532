//! Top-level session driving the retrieve → calculate → report/map pipeline
//!
//! A session owns the HTTP clients, the country catalogue and the result of the
//! most recent successful run. Each step replaces the previous state wholesale;
//! a failing step leaves it untouched.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::cities::{CityFetcher, CountryCatalogue};
use crate::config::TransitRatioConfig;
use crate::google::MapsClient;
use crate::map::{MapRenderer, MapView};
use crate::models::{City, GeoPoint, Origin};
use crate::percentile::{top_percentile, validate_percentile};
use crate::report::{Report, ReportBuilder, ReportRow};
use crate::travel::TravelCalculator;
use crate::{Result, TransitRatioError, http};

/// Cities retrieved for one country
#[derive(Debug, Clone)]
struct Retrieval {
    country: String,
    cities: Vec<City>,
}

pub struct TransitRatio {
    config: TransitRatioConfig,
    fetcher: CityFetcher,
    maps: MapsClient,
    calculator: TravelCalculator,
    countries: Option<CountryCatalogue>,
    retrieval: Option<Retrieval>,
    report: Option<Report>,
}

impl TransitRatio {
    /// Create a session; the maps API key must be configured.
    pub fn new(config: TransitRatioConfig) -> Result<Self> {
        let api_key = config
            .maps
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                TransitRatioError::authentication(
                    "A maps API key is required (set maps.api_key or TRANSIT_RATIO_MAPS__API_KEY)",
                )
            })?
            .to_string();

        let client = http::build_client(&config.maps)?;
        let maps = MapsClient::new(client.clone(), &config.maps.base_url, api_key);
        let fetcher = CityFetcher::new(client, config.open_data.clone());
        let calculator = TravelCalculator::new(maps.clone(), config.travel.clone());

        Ok(Self {
            config,
            fetcher,
            maps,
            calculator,
            countries: None,
            retrieval: None,
            report: None,
        })
    }

    /// The country catalogue, downloaded on first use
    pub async fn countries(&mut self) -> Result<&CountryCatalogue> {
        let countries = match self.countries.take() {
            Some(countries) => countries,
            None => self.fetcher.fetch_countries().await?,
        };
        Ok(self.countries.insert(countries))
    }

    /// Download the cities of `country` and keep the top `percentile` by population.
    ///
    /// Replaces any previous retrieval and discards the previous report.
    /// Returns the number of cities kept.
    #[instrument(skip(self))]
    pub async fn retrieve_cities(&mut self, country: &str, percentile: f64) -> Result<usize> {
        validate_percentile(percentile)?;

        let code = country.trim().to_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TransitRatioError::validation(format!(
                "'{country}' is not an ISO 3166-1 alpha-2 country code"
            )));
        }

        if !self.countries().await?.contains_key(&code) {
            return Err(TransitRatioError::validation(format!(
                "'{code}' is not a valid country"
            )));
        }

        let cities = self.fetcher.fetch_cities(&code).await?;
        let total = cities.len();
        let cities = top_percentile(&cities, percentile)?;

        info!(
            "Found {} cities ({} in the top {}% of {})",
            cities.len(),
            code,
            percentile,
            total
        );

        let kept = cities.len();
        self.retrieval = Some(Retrieval {
            country: code,
            cities,
        });
        self.report = None;
        Ok(kept)
    }

    /// Compute travel times from `origin` to every retrieved city and store the report
    #[instrument(skip(self))]
    pub async fn calculate_travel(&mut self, origin: &str) -> Result<&Report> {
        let Some(retrieval) = self.retrieval.as_ref() else {
            return Err(TransitRatioError::validation(
                "No cities retrieved yet; call retrieve_cities first",
            ));
        };

        let address = origin.trim();
        if address.is_empty() {
            return Err(TransitRatioError::validation("Origin cannot be empty"));
        }

        let point = self.maps.geocode(address).await?.ok_or_else(|| {
            TransitRatioError::validation(format!("Not a valid origin '{address}'"))
        })?;
        let origin = Origin {
            address: address.to_string(),
            point,
        };

        let country_name = self
            .countries
            .as_ref()
            .and_then(|c| c.get(&retrieval.country))
            .map(String::as_str);

        let batch = self
            .calculator
            .calculate(&origin, &retrieval.cities, country_name)
            .await?;

        let report = ReportBuilder::build(
            &origin,
            &retrieval.country,
            &retrieval.cities,
            &batch,
            Utc::now(),
        );

        let summary = report.summary();
        match summary.average_distance_km() {
            Some(km) => info!("Done. Average distance: {:.2} km", km),
            None => warn!("Done. No city could be reached from '{}'", origin.address),
        }
        for failure in &report.failures {
            warn!("No {} route to {}", failure.mode, failure.city);
        }

        Ok(self.report.insert(report))
    }

    /// Cities of the latest retrieval
    #[must_use]
    pub fn cities(&self) -> Option<&[City]> {
        self.retrieval.as_ref().map(|r| r.cities.as_slice())
    }

    /// Report of the latest calculation
    pub fn report(&self) -> Result<&Report> {
        self.report.as_ref().ok_or_else(|| {
            TransitRatioError::validation("No report available; call calculate_travel first")
        })
    }

    /// The first `n` rows of the latest report
    pub fn top_cities(&self, n: usize) -> Result<&[ReportRow]> {
        Ok(self.report()?.top(n))
    }

    /// Map of the latest report, centred on the country when it can be geocoded
    #[instrument(skip(self))]
    pub async fn map(&self) -> Result<MapView> {
        let report = self.report()?;
        let center = self.map_center(report).await?;
        MapRenderer::render(&report.origin, center, self.config.map.zoom, report)
    }

    async fn map_center(&self, report: &Report) -> Result<GeoPoint> {
        let Some(country_name) = self
            .countries
            .as_ref()
            .and_then(|c| c.get(&report.country))
        else {
            return Ok(report.origin.point);
        };

        match self.maps.geocode(country_name).await {
            Ok(Some(point)) => Ok(point),
            Ok(None) => Ok(report.origin.point),
            Err(e @ TransitRatioError::Authentication { .. }) => Err(e),
            Err(e) => {
                warn!("Could not geocode {}, centring on origin: {}", country_name, e);
                Ok(report.origin.point)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_authentication_error() {
        let result = TransitRatio::new(TransitRatioConfig::default());
        assert!(matches!(
            result,
            Err(TransitRatioError::Authentication { .. })
        ));

        let mut config = TransitRatioConfig::default();
        config.maps.api_key = Some("   ".to_string());
        assert!(matches!(
            TransitRatio::new(config),
            Err(TransitRatioError::Authentication { .. })
        ));
    }

    #[test]
    fn test_fresh_session_has_no_results() {
        let mut config = TransitRatioConfig::default();
        config.maps.api_key = Some("test_api_key_123".to_string());
        let session = TransitRatio::new(config).unwrap();
        assert!(session.cities().is_none());
        assert!(matches!(
            session.report(),
            Err(TransitRatioError::Validation { .. })
        ));
        assert!(session.top_cities(5).is_err());
    }

    #[tokio::test]
    async fn test_calculate_before_retrieve() {
        let mut config = TransitRatioConfig::default();
        config.maps.api_key = Some("test_api_key_123".to_string());
        let mut session = TransitRatio::new(config).unwrap();
        let err = session.calculate_travel("Madrid").await.unwrap_err();
        assert!(err.to_string().contains("retrieve_cities"));
    }

    #[tokio::test]
    async fn test_invalid_percentile_rejected_before_download() {
        let mut config = TransitRatioConfig::default();
        config.maps.api_key = Some("test_api_key_123".to_string());
        // unroutable: any download attempt would fail with a data source error
        config.open_data.base_url = "http://127.0.0.1:9".to_string();
        config.maps.max_retries = 0;
        let mut session = TransitRatio::new(config).unwrap();

        for percentile in [-1.0, 101.0] {
            let err = session.retrieve_cities("ES", percentile).await.unwrap_err();
            assert!(matches!(err, TransitRatioError::Validation { .. }));
        }
        let err = session.retrieve_cities("Spain", 5.0).await.unwrap_err();
        assert!(matches!(err, TransitRatioError::Validation { .. }));
    }
}
