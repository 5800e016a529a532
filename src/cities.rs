//! Open-data city list client
//!
//! Downloads the `worldcitiespop` and `geonames-country` datasets from an
//! opendatasoft records API as `;`-separated CSV and turns them into [`City`]
//! records and a country catalogue.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::OpenDataConfig;
use crate::http::{self, FetchError};
use crate::models::{City, GeoPoint, title_case};
use crate::{Result, TransitRatioError};

const DOWNLOAD_PATH: &str = "/api/records/1.0/download";

/// ISO code to country name, ordered by code
pub type CountryCatalogue = BTreeMap<String, String>;

// Short rows deserialize with empty fields and are rejected row by row.
#[derive(Debug, Deserialize)]
struct CityRecord {
    city: String,
    #[serde(default)]
    population: String,
    #[serde(default)]
    geopoint: String,
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    iso: String,
    #[serde(default)]
    country: String,
}

/// Client for the open-data city and country datasets
pub struct CityFetcher {
    client: ClientWithMiddleware,
    config: OpenDataConfig,
}

impl CityFetcher {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, config: OpenDataConfig) -> Self {
        Self { client, config }
    }

    /// All cities of `country` with a known population, most populous first,
    /// one entry per city name.
    #[instrument(skip(self))]
    pub async fn fetch_cities(&self, country: &str) -> Result<Vec<City>> {
        let country = country.to_uppercase();
        let start = Instant::now();

        let url = self.download_url(&[
            ("dataset", self.config.cities_dataset.as_str()),
            ("refine.country", &country.to_lowercase()),
            ("q", "population>0"),
            ("fields", "city,population,geopoint"),
        ]);

        let body = self.download(&url).await?;
        let cities = parse_cities(&body, &country)?;

        if cities.is_empty() {
            return Err(TransitRatioError::data_source(format!(
                "No cities with population data found for country '{country}'"
            )));
        }

        info!(
            "Downloaded {} cities for {} in {:.3}s",
            cities.len(),
            country,
            start.elapsed().as_secs_f64()
        );
        Ok(cities)
    }

    /// The country catalogue used to validate ISO codes
    #[instrument(skip(self))]
    pub async fn fetch_countries(&self) -> Result<CountryCatalogue> {
        let url = self.download_url(&[
            ("dataset", self.config.countries_dataset.as_str()),
            ("fields", "iso,country"),
            ("q", "population>0"),
        ]);

        let body = self.download(&url).await?;
        let countries = parse_countries(&body)?;

        if countries.is_empty() {
            return Err(TransitRatioError::data_source("Country catalogue is empty"));
        }

        debug!("Loaded {} countries", countries.len());
        Ok(countries)
    }

    fn download_url(&self, params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!(
            "{}{}?{}",
            self.config.base_url.trim_end_matches('/'),
            DOWNLOAD_PATH,
            query
        )
    }

    async fn download(&self, url: &str) -> Result<String> {
        let response = http::fetch(&self.client, url)
            .await
            .map_err(|e: FetchError| TransitRatioError::data_source(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| TransitRatioError::data_source(format!("Failed to read response: {e}")))
    }
}

fn csv_reader(body: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes())
}

/// Parse the city CSV, sort by population (descending) and drop repeated names.
///
/// Rows with an unusable population or geopoint are skipped.
pub fn parse_cities(body: &str, country: &str) -> Result<Vec<City>> {
    let mut reader = csv_reader(body);
    let mut cities = Vec::new();

    for (line, record) in reader.deserialize::<CityRecord>().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed city row {}: {}", line + 1, e);
                continue;
            }
        };

        let population = match record.population.parse::<f64>() {
            Ok(p) if p.is_finite() && p > 0.0 => p.round() as u64,
            _ => {
                warn!(
                    "Skipping '{}' (row {}): invalid population '{}'",
                    record.city,
                    line + 1,
                    record.population
                );
                continue;
            }
        };

        let point = match record.geopoint.parse::<GeoPoint>() {
            Ok(point) => point,
            Err(e) => {
                warn!("Skipping '{}' (row {}): {}", record.city, line + 1, e);
                continue;
            }
        };

        cities.push(City::new(
            title_case(&record.city),
            country.to_uppercase(),
            point,
            population,
        ));
    }

    // stable: equal populations keep download order
    cities.sort_by(|a, b| b.population.cmp(&a.population));

    let mut seen = HashSet::new();
    cities.retain(|city| seen.insert(city.name.clone()));

    Ok(cities)
}

/// Parse the `iso;country` CSV into a catalogue keyed by upper-case ISO code
pub fn parse_countries(body: &str) -> Result<CountryCatalogue> {
    let mut reader = csv_reader(body);
    let mut countries = CountryCatalogue::new();

    for (line, record) in reader.deserialize::<CountryRecord>().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed country row {}: {}", line + 1, e);
                continue;
            }
        };
        if record.iso.is_empty() || record.country.is_empty() {
            continue;
        }
        countries.insert(record.iso.to_uppercase(), record.country);
    }

    Ok(countries)
}
