//! Data models for the TransitRatio pipeline
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and distance helpers
//! - City: Populated places from the open-data city list
//! - Travel: Directions results, failures and per-city travel summaries

pub mod city;
pub mod location;
pub mod travel;

// Re-export all public types for convenient access
pub use city::{City, title_case};
pub use location::GeoPoint;
pub use travel::{CityTravel, Origin, RouteFailure, TravelBatch, TravelMode, TravelResult};
