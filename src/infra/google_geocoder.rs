use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::app::ports::{GeocodeError, GeocodeHit, GeocoderPort};
use crate::config::GeocoderConfig;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
    #[serde(default)]
    partial_match: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
    #[serde(default)]
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Geocoder backed by the Google Geocoding web service.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edu_locations/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    /// Build from config, reading the API key from the configured variable.
    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        Self::new(&config.base_url, config.api_key()?, config.timeout())
    }
}

#[async_trait]
impl GeocoderPort for GoogleGeocoder {
    async fn geocode(&self, query: &str) -> std::result::Result<GeocodeHit, GeocodeError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", query), ("key", self.api_key.as_str()), ("region", "nl")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(transport_error)?;
        debug!(status, "Geocoder responded for '{}'", query);
        parse_response(status, &body)
    }
}

/// The request URL carries the API key, so it is stripped before the error
/// becomes a reason that is logged and written to the cache.
fn transport_error(e: reqwest::Error) -> GeocodeError {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    GeocodeError::Transient(format!("{kind}: {}", e.without_url()))
}

/// Classify a provider response into a hit or a failure kind.
pub fn parse_response(http_status: u16, body: &str) -> std::result::Result<GeocodeHit, GeocodeError> {
    match http_status {
        429 => return Err(GeocodeError::Transient("HTTP 429".to_string())),
        500..=599 => return Err(GeocodeError::Transient(format!("HTTP {http_status}"))),
        401 | 403 => return Err(GeocodeError::Fatal(format!("HTTP {http_status}"))),
        400..=499 => return Err(GeocodeError::Invalid(format!("HTTP {http_status}"))),
        _ => {}
    }

    let parsed: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| GeocodeError::Transient(format!("unreadable response: {e}")))?;
    let detail = |status: &str| match &parsed.error_message {
        Some(message) => format!("{status}: {message}"),
        None => status.to_string(),
    };

    match parsed.status.as_str() {
        "OK" => {
            let first = parsed
                .results
                .first()
                .ok_or(GeocodeError::NotFound)?;
            let mut quality = first
                .geometry
                .location_type
                .as_deref()
                .map(str::to_ascii_lowercase);
            if first.partial_match {
                quality = Some(match quality {
                    Some(q) => format!("{q};partial"),
                    None => "partial".to_string(),
                });
            }
            Ok(GeocodeHit {
                latitude: first.geometry.location.lat,
                longitude: first.geometry.location.lng,
                quality,
            })
        }
        "ZERO_RESULTS" => Err(GeocodeError::NotFound),
        "INVALID_REQUEST" => Err(GeocodeError::Invalid(detail("INVALID_REQUEST"))),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(GeocodeError::Transient(detail(&parsed.status))),
        "REQUEST_DENIED" | "OVER_DAILY_LIMIT" => Err(GeocodeError::Fatal(detail(&parsed.status))),
        other => Err(GeocodeError::Transient(detail(other))),
    }
}
