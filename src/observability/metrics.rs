//! Metrics for the merge, geocode and refine stages.
//!
//! Recorded through the `metrics` facade. When a recorder is installed with
//! [`init`], a Prometheus text snapshot can be written at the end of a run.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Every metric name used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Merge
    MergeRowsRead,
    MergeRowsDropped,
    MergeMalformedDates,
    MergeUnknownSector,
    MergeLocationsWritten,

    // Geocode
    GeocodeRequests,
    GeocodeRetries,
    GeocodeCacheHits,
    GeocodeResults,
    GeocodeRequestDuration,

    // Refine
    RefineRowsWritten,
    RefineUngeocoded,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::MergeRowsRead => "edu_merge_rows_read_total",
            MetricName::MergeRowsDropped => "edu_merge_rows_dropped_total",
            MetricName::MergeMalformedDates => "edu_merge_malformed_dates_total",
            MetricName::MergeUnknownSector => "edu_merge_unknown_sector_total",
            MetricName::MergeLocationsWritten => "edu_merge_locations_written_total",
            MetricName::GeocodeRequests => "edu_geocode_requests_total",
            MetricName::GeocodeRetries => "edu_geocode_retries_total",
            MetricName::GeocodeCacheHits => "edu_geocode_cache_hits_total",
            MetricName::GeocodeResults => "edu_geocode_results_total",
            MetricName::GeocodeRequestDuration => "edu_geocode_request_duration_seconds",
            MetricName::RefineRowsWritten => "edu_refine_rows_written_total",
            MetricName::RefineUngeocoded => "edu_refine_ungeocoded_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Metrics recorder installed");
        }
        Err(e) => warn!("Metrics recorder not installed: {}", e),
    }
}

/// Write the current metric values in Prometheus text format.
pub fn write_snapshot(path: &Path) -> std::io::Result<()> {
    if let Some(handle) = HANDLE.get() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, handle.render())?;
    }
    Ok(())
}

// ============================================================================
// Merge Metrics
// ============================================================================

pub mod merge {
    use super::MetricName;

    pub fn rows_read(count: usize) {
        ::metrics::counter!(MetricName::MergeRowsRead.as_str()).increment(count as u64);
    }

    pub fn rows_dropped(reason: &'static str, count: usize) {
        ::metrics::counter!(MetricName::MergeRowsDropped.as_str(), "reason" => reason)
            .increment(count as u64);
    }

    pub fn malformed_dates(count: usize) {
        ::metrics::counter!(MetricName::MergeMalformedDates.as_str()).increment(count as u64);
    }

    pub fn unknown_sector(count: usize) {
        ::metrics::counter!(MetricName::MergeUnknownSector.as_str()).increment(count as u64);
    }

    pub fn locations_written(sector: &str, count: usize) {
        ::metrics::counter!(MetricName::MergeLocationsWritten.as_str(), "sector" => sector.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Geocode Metrics
// ============================================================================

pub mod geocode {
    use super::MetricName;

    pub fn request() {
        ::metrics::counter!(MetricName::GeocodeRequests.as_str()).increment(1);
    }

    pub fn retry() {
        ::metrics::counter!(MetricName::GeocodeRetries.as_str()).increment(1);
    }

    pub fn cache_hit(source: &'static str) {
        ::metrics::counter!(MetricName::GeocodeCacheHits.as_str(), "source" => source).increment(1);
    }

    /// One final outcome per address, labelled by status
    pub fn result(status: &'static str) {
        ::metrics::counter!(MetricName::GeocodeResults.as_str(), "status" => status).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::GeocodeRequestDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Refine Metrics
// ============================================================================

pub mod refine {
    use super::MetricName;

    pub fn rows_written(sector: &str, count: usize) {
        ::metrics::counter!(MetricName::RefineRowsWritten.as_str(), "sector" => sector.to_string())
            .increment(count as u64);
    }

    pub fn ungeocoded(count: usize) {
        ::metrics::counter!(MetricName::RefineUngeocoded.as_str()).increment(count as u64);
    }
}
