//! Tabular report of cities and their travel times
//!
//! [`ReportBuilder`] zips the filtered cities with the travel batch into
//! [`Report`] rows. A report can be printed as a plain-text table or exported
//! as CSV or JSON.

use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;
use crate::models::{City, Origin, RouteFailure, TravelBatch, TravelResult};

/// One city with a driving route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRow {
    /// 1-based position in the filtered city list
    pub rank: usize,
    pub city: City,
    pub driving: TravelResult,
    pub transit: Option<TravelResult>,
    /// Transit duration / driving duration
    pub ratio: Option<f64>,
    /// Great-circle distance from the origin
    pub straight_line_km: f64,
}

/// Flat CSV shape of a [`ReportRow`]
#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    rank: usize,
    city: &'a str,
    country: &'a str,
    population: u64,
    latitude: f64,
    longitude: f64,
    driving_distance_m: u64,
    driving_duration_s: u64,
    transit_distance_m: Option<u64>,
    transit_duration_s: Option<u64>,
    ratio: Option<f64>,
    straight_line_km: f64,
}

impl<'a> From<&'a ReportRow> for ReportRecord<'a> {
    fn from(row: &'a ReportRow) -> Self {
        Self {
            rank: row.rank,
            city: &row.city.name,
            country: &row.city.country,
            population: row.city.population,
            latitude: row.city.latitude,
            longitude: row.city.longitude,
            driving_distance_m: row.driving.distance_m,
            driving_duration_s: row.driving.duration_s,
            transit_distance_m: row.transit.as_ref().map(|t| t.distance_m),
            transit_duration_s: row.transit.as_ref().map(|t| t.duration_s),
            ratio: row.ratio,
            straight_line_km: row.straight_line_km,
        }
    }
}

/// Result of one retrieve + calculate cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub origin: Origin,
    /// ISO code of the country the cities belong to
    pub country: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub failures: Vec<RouteFailure>,
}

/// Aggregate figures over a report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportSummary {
    pub cities: usize,
    pub failures: usize,
    pub mean_driving_km: Option<f64>,
    pub mean_transit_km: Option<f64>,
    pub mean_ratio: Option<f64>,
}

impl ReportSummary {
    /// Mean of the driving and transit mean distances
    #[must_use]
    pub fn average_distance_km(&self) -> Option<f64> {
        match (self.mean_driving_km, self.mean_transit_km) {
            (Some(d), Some(t)) => Some((d + t) / 2.0),
            (d, t) => d.or(t),
        }
    }
}

/// Assembles reports from cities and travel results
pub struct ReportBuilder;

impl ReportBuilder {
    /// Zip `cities` with `batch.results`, keeping cities that have a driving route
    #[must_use]
    pub fn build(
        origin: &Origin,
        country: &str,
        cities: &[City],
        batch: &TravelBatch,
        generated_at: DateTime<Utc>,
    ) -> Report {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(batch.successful());

        for (i, (city, travel)) in cities.iter().zip(&batch.results).enumerate() {
            let Some(travel) = travel else { continue };
            if !seen.insert(city.name.as_str()) {
                warn!("Dropping duplicate report row for {}", city.name);
                continue;
            }
            rows.push(ReportRow {
                rank: i + 1,
                city: city.clone(),
                driving: travel.driving.clone(),
                transit: travel.transit.clone(),
                ratio: travel.ratio(),
                straight_line_km: origin.point.distance_km(&city.point()),
            });
        }

        Report {
            origin: origin.clone(),
            country: country.to_string(),
            generated_at,
            rows,
            failures: batch.failures.clone(),
        }
    }
}

impl Report {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `min(n, len)` rows
    #[must_use]
    pub fn top(&self, n: usize) -> &[ReportRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let driving: Vec<f64> = self
            .rows
            .iter()
            .map(|r| r.driving.distance_m as f64 / 1000.0)
            .collect();
        let transit: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|r| r.transit.as_ref())
            .map(|t| t.distance_m as f64 / 1000.0)
            .collect();
        let ratios: Vec<f64> = self.rows.iter().filter_map(|r| r.ratio).collect();

        ReportSummary {
            cities: self.rows.len(),
            failures: self.failures.len(),
            mean_driving_km: mean(&driving),
            mean_transit_km: mean(&transit),
            mean_ratio: mean(&ratios),
        }
    }

    /// Plain-text table of `rows`
    #[must_use]
    pub fn format_table(rows: &[ReportRow]) -> String {
        let header = [
            "#",
            "City",
            "Population",
            "Driving km",
            "Driving time",
            "Transit km",
            "Transit time",
            "Ratio",
        ];

        let body: Vec<[String; 8]> = rows
            .iter()
            .map(|row| {
                [
                    row.rank.to_string(),
                    row.city.name.clone(),
                    row.city.population.to_string(),
                    format_km(row.driving.distance_m),
                    format_duration(row.driving.duration_s),
                    row.transit
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |t| format_km(t.distance_m)),
                    row.transit
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |t| format_duration(t.duration_s)),
                    row.ratio
                        .map_or_else(|| "-".to_string(), |r| format!("{r:.2}")),
                ]
            })
            .collect();

        let mut widths = header.map(str::len);
        for cells in &body {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let render = |cells: &[&str], out: &mut String| {
            let line = cells
                .iter()
                .zip(widths)
                .enumerate()
                .map(|(col, (cell, w))| {
                    // city names left-aligned, numbers right-aligned
                    if col == 1 {
                        format!("{cell:<w$}")
                    } else {
                        format!("{cell:>w$}")
                    }
                })
                .collect::<Vec<_>>()
                .join("  ");
            out.push_str(line.trim_end());
            out.push('\n');
        };

        render(&header, &mut out);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        render(&rule.iter().map(String::as_str).collect::<Vec<_>>(), &mut out);
        for cells in &body {
            render(&cells.iter().map(String::as_str).collect::<Vec<_>>(), &mut out);
        }
        out
    }

    /// Plain-text table of every row
    #[must_use]
    pub fn to_table(&self) -> String {
        Self::format_table(&self.rows)
    }

    /// Write one CSV record per row, with a header line
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(ReportRecord::from(row))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Format seconds as `H:MM:SS`, prefixed with the day count past 24 hours
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rem = seconds % 86_400;
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        d => format!("{d} days, {hms}"),
    }
}

/// Format meters as kilometers with one decimal
#[must_use]
pub fn format_km(meters: u64) -> String {
    format!("{:.1}", meters as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityTravel, GeoPoint, TravelMode};
    use chrono::TimeZone;

    fn origin() -> Origin {
        Origin {
            address: "Atocha, Madrid".to_string(),
            point: GeoPoint::new(40.4066, -3.6892).unwrap(),
        }
    }

    fn city(name: &str, population: u64, lat: f64, lon: f64) -> City {
        City::new(
            name.to_string(),
            "ES".to_string(),
            GeoPoint::new(lat, lon).unwrap(),
            population,
        )
    }

    fn travel(city: &City, driving_s: u64, transit_s: Option<u64>) -> CityTravel {
        let result = |mode, duration_s, distance_m| TravelResult {
            origin: "Atocha, Madrid".to_string(),
            destination: city.clone(),
            duration_s,
            distance_m,
            mode,
        };
        CityTravel {
            driving: result(TravelMode::Driving, driving_s, 600_000),
            transit: transit_s.map(|s| result(TravelMode::Transit, s, 620_000)),
        }
    }

    fn sample() -> (Vec<City>, TravelBatch) {
        let cities = vec![
            city("Barcelona", 1_581_595, 41.3984, 2.1741),
            city("Palma", 409_661, 39.5696, 2.6502),
            city("Valencia", 814_208, 39.4699, -0.3763),
        ];
        let batch = TravelBatch {
            results: vec![
                Some(travel(&cities[0], 21_600, Some(10_800))),
                None,
                Some(travel(&cities[2], 12_600, None)),
            ],
            failures: vec![RouteFailure {
                city: "Palma".to_string(),
                mode: TravelMode::Driving,
                reason: "No driving route found to 39.5696,2.6502".to_string(),
            }],
        };
        (cities, batch)
    }

    fn build() -> Report {
        let (cities, batch) = sample();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ReportBuilder::build(&origin(), "ES", &cities, &batch, at)
    }

    #[test]
    fn test_rows_match_successful_results() {
        let report = build();
        assert_eq!(report.len(), 2);
        assert_eq!(report.rows[0].city.name, "Barcelona");
        assert_eq!(report.rows[0].rank, 1);
        assert_eq!(report.rows[1].city.name, "Valencia");
        assert_eq!(report.rows[1].rank, 3);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_ratio_and_straight_line_distance() {
        let report = build();
        assert_eq!(report.rows[0].ratio, Some(0.5));
        assert_eq!(report.rows[1].ratio, None);
        let km = report.rows[0].straight_line_km;
        assert!((490.0..=520.0).contains(&km), "got {km}");
    }

    #[test]
    fn test_duplicate_cities_are_dropped() {
        let (mut cities, mut batch) = sample();
        cities.push(cities[0].clone());
        batch.results.push(Some(travel(&cities[0], 21_000, None)));
        let report = ReportBuilder::build(&origin(), "ES", &cities, &batch, Utc::now());
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let report =
            ReportBuilder::build(&origin(), "ES", &[], &TravelBatch::default(), Utc::now());
        assert!(report.is_empty());
        assert!(report.top(5).is_empty());
        assert_eq!(report.summary().mean_ratio, None);
        assert_eq!(report.summary().average_distance_km(), None);
    }

    #[test]
    fn test_top() {
        let report = build();
        assert_eq!(report.top(1).len(), 1);
        assert_eq!(report.top(10).len(), 2);
    }

    #[test]
    fn test_summary() {
        let summary = build().summary();
        assert_eq!(summary.cities, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.mean_driving_km, Some(600.0));
        assert_eq!(summary.mean_transit_km, Some(620.0));
        assert_eq!(summary.mean_ratio, Some(0.5));
        assert_eq!(summary.average_distance_km(), Some(610.0));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(3_725), "1:02:05");
        assert_eq!(format_duration(86_400 + 61), "1 day, 0:01:01");
        assert_eq!(format_duration(2 * 86_400 + 3_600), "2 days, 1:00:00");
    }

    #[test]
    fn test_table_layout() {
        let table = build().to_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Transit time"));
        assert!(lines[2].contains("Barcelona"));
        assert!(lines[2].contains("6:00:00"));
        assert!(lines[2].contains("0.50"));
        assert!(lines[3].contains("Valencia"));
        assert!(lines[3].ends_with('-'));
    }

    #[test]
    fn test_csv_export() {
        let mut buf = Vec::new();
        build().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "rank,city,country,population,latitude,longitude,driving_distance_m,driving_duration_s,transit_distance_m,transit_duration_s,ratio,straight_line_km"
        );
        assert!(lines.next().unwrap().starts_with("1,Barcelona,ES,1581595,"));
        let valencia = lines.next().unwrap();
        assert!(valencia.starts_with("3,Valencia,ES,814208,"));
        assert!(valencia.contains(",600000,12600,,,,"));
    }

    #[test]
    fn test_json_export() {
        let report = build();
        let json = report.to_json().unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rows.len(), report.rows.len());
        assert_eq!(parsed.rows[0].city.name, "Barcelona");
        assert_eq!(parsed.rows[0].driving.duration_s, 21_600);
        assert_eq!(parsed.failures, report.failures);
        assert_eq!(parsed.generated_at, report.generated_at);
    }
}
