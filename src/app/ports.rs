use async_trait::async_trait;
use thiserror::Error;

/// A coordinate returned by a geocoding provider.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    /// Provider precision flag, e.g. `rooftop` or `approximate;partial`
    pub quality: Option<String>,
}

/// Provider failures, classified by how the caller must react.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    /// Timeouts, connection failures, rate limiting, provider-side errors.
    /// Worth retrying after a backoff.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// The provider answered and knows no such address.
    #[error("address not found")]
    NotFound,
    /// The provider rejected the query itself; retrying will not help.
    #[error("invalid request: {0}")]
    Invalid(String),
    /// Credentials rejected or quota exhausted; the whole stage must stop.
    #[error("fatal provider failure: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait GeocoderPort: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<GeocodeHit, GeocodeError>;
}
