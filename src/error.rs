//! Error types and handling for the `TransitRatio` pipeline

use thiserror::Error;

use crate::models::TravelMode;

/// Main error type for the `TransitRatio` library
#[derive(Error, Debug)]
pub enum TransitRatioError {
    /// The city list or country catalogue could not be downloaded
    #[error("Data source error: {message}")]
    DataSource { message: String },

    /// No route exists between the origin and a destination
    #[error("No {mode} route found to {destination}")]
    RouteNotFound {
        destination: String,
        mode: TravelMode,
    },

    /// Missing or rejected API key
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Unexpected answer from the maps API
    #[error("API error: {message}")]
    Api { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Map page or popup template failed to render
    #[error("Render error: {source}")]
    Render {
        #[from]
        source: askama::Error,
    },
}

impl TransitRatioError {
    /// Create a new data source error
    pub fn data_source<S: Into<String>>(message: S) -> Self {
        Self::DataSource {
            message: message.into(),
        }
    }

    /// Create a new route-not-found error
    pub fn route_not_found<S: Into<String>>(destination: S, mode: TravelMode) -> Self {
        Self::RouteNotFound {
            destination: destination.into(),
            mode,
        }
    }

    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the pipeline may continue past this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransitRatioError::RouteNotFound { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TransitRatioError::DataSource { .. } => {
                "Unable to download the city list. Please check your internet connection and the country code."
                    .to_string()
            }
            TransitRatioError::RouteNotFound { destination, mode } => {
                format!("No {mode} route is available to {destination}.")
            }
            TransitRatioError::Authentication { .. } => {
                "The maps API rejected the request. Please check your API key.".to_string()
            }
            TransitRatioError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TransitRatioError::Api { .. } => {
                "Unable to connect to the maps API. Please check your internet connection."
                    .to_string()
            }
            TransitRatioError::Config { .. } => {
                "Configuration error. Please check your config file and API key.".to_string()
            }
            TransitRatioError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            TransitRatioError::Csv { .. } | TransitRatioError::Json { .. } => {
                "Failed to write the report.".to_string()
            }
            TransitRatioError::Render { .. } => "Failed to render the map.".to_string(),
        }
    }
}
