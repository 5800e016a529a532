//! `TransitRatio` - how well does public transport compete with the car?
//!
//! This library downloads a country's city list, keeps the most populous
//! cities, asks a directions API for driving and transit routes from a fixed
//! origin to each of them, and reports the results as a table and a map.

pub mod cities;
pub mod config;
pub mod error;
pub mod google;
pub mod http;
pub mod logging;
pub mod map;
pub mod models;
pub mod percentile;
pub mod report;
pub mod session;
pub mod travel;

// Re-export core types for public API
pub use cities::{CityFetcher, CountryCatalogue};
pub use config::TransitRatioConfig;
pub use error::TransitRatioError;
pub use google::{MapsClient, RouteLeg};
pub use map::{MapRenderer, MapView, Marker, MarkerKind};
pub use models::{City, CityTravel, GeoPoint, Origin, RouteFailure, TravelBatch, TravelMode, TravelResult};
pub use percentile::top_percentile;
pub use report::{Report, ReportBuilder, ReportRow, ReportSummary};
pub use session::TransitRatio;
pub use travel::TravelCalculator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TransitRatioError>;
