use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::{GeocodeError, GeocodeHit, GeocoderPort};
use crate::config::GeocoderConfig;
use crate::pipeline::geocoding::rate_limiter::RateLimiter;

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GeocoderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Wait before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Final outcome of one address after retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
    pub result: Result<GeocodeHit, GeocodeError>,
    pub attempts: u32,
}

/// Query the provider for one address.
///
/// Transient failures are retried up to `policy.max_attempts` with backoff;
/// not-found and invalid answers are returned after a single attempt. Every
/// attempt passes through the rate limiter. A fatal failure is returned
/// immediately and the caller is expected to abort.
pub async fn geocode_with_retries(
    geocoder: &dyn GeocoderPort,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    query: &str,
) -> Attempted {
    let mut attempt = 0;
    loop {
        attempt += 1;
        limiter.acquire().await;

        match geocoder.geocode(query).await {
            Err(GeocodeError::Transient(reason)) if attempt < policy.max_attempts => {
                let wait = policy.backoff_for(attempt);
                warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Transient geocoding failure for '{}': {}",
                    query,
                    reason
                );
                crate::observability::metrics::geocode::retry();
                tokio::time::sleep(wait).await;
            }
            result => {
                if attempt > 1 {
                    debug!(attempt, "Geocoding settled after retries");
                }
                return Attempted {
                    result,
                    attempts: attempt,
                };
            }
        }
    }
}
