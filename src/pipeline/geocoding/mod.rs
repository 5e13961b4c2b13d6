// Geocoding: persistent result cache, request pacing and retry policy

pub mod cache;
pub mod rate_limiter;
pub mod retry;

pub use cache::{read_geocoded, GeocodeCache};
pub use rate_limiter::RateLimiter;
pub use retry::{geocode_with_retries, Attempted, RetryPolicy};
