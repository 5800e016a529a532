//! Shared HTTP client with transient-failure retries

use std::time::{Duration, Instant};

use reqwest::{Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use thiserror::Error;
use tracing::{debug, warn};

use crate::TransitRatioError;
use crate::config::MapsConfig;

/// Why a GET did not produce a successful response
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or middleware failure after all retries
    #[error("request failed: {0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("HTTP {status}{suffix}", status = .0, suffix = body_suffix(.1))]
    Status(StatusCode, String),
}

impl FetchError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            FetchError::Status(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _)
        )
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// Build the client used for both the open-data and the maps API
pub fn build_client(config: &MapsConfig) -> crate::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds.into()))
        .user_agent(concat!("TransitRatio/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransitRatioError::config(format!("Failed to create HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Replace the value of any `key=` query parameter so URLs can be logged
#[must_use]
pub fn redact_key(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| {
            if pair.starts_with("key=") {
                "key=REDACTED"
            } else {
                pair
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

/// GET `url`, returning the response only for a success status
pub async fn fetch(client: &ClientWithMiddleware, url: &str) -> Result<Response, FetchError> {
    let start = Instant::now();
    debug!("GET {}", redact_key(url));

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    debug!(
        "HTTP response received: {} in {:.3}s",
        status,
        start.elapsed().as_secs_f64()
    );

    if status.is_success() {
        if start.elapsed().as_secs() > 5 {
            warn!("Slow API response: {:.3}s", start.elapsed().as_secs_f64());
        }
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status(status, body.chars().take(200).collect()))
}
