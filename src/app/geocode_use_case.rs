use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::app::ports::{GeocodeError, GeocoderPort};
use crate::config::{GeocoderConfig, PathsConfig};
use crate::domain::{GeocodeResult, GeocodeStatus, Sector};
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::pipeline::geocoding::{
    geocode_with_retries, read_geocoded, GeocodeCache, RateLimiter, RetryPolicy,
};
use crate::pipeline::processing::normalize::geocode_query;
use crate::pipeline::storage::read_merged_locations;

/// Counts reported at the end of a geocode run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    pub unique_addresses: usize,
    /// Already answered in this sector's cache
    pub cached: usize,
    /// Answered in another sector's cache and copied over
    pub copied: usize,
    /// Provider requests issued, retries included
    pub requests: usize,
    pub ok: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Use case for geocoding the unique addresses of each merged sector table
pub struct GeocodeUseCase {
    geocoder: Box<dyn GeocoderPort>,
    paths: PathsConfig,
    settings: GeocoderConfig,
}

impl GeocodeUseCase {
    pub fn new(geocoder: Box<dyn GeocoderPort>, paths: PathsConfig, settings: GeocoderConfig) -> Self {
        Self {
            geocoder,
            paths,
            settings,
        }
    }

    /// Final answers already on disk in any sector's geocode table.
    fn preload_resolved(&self) -> Result<HashMap<String, GeocodeResult>> {
        let mut resolved = HashMap::new();
        for sector in Sector::ALL {
            let path = self.paths.geocoded_path(sector.as_str());
            if !path.exists() {
                continue;
            }
            for (address, result) in read_geocoded(&path)? {
                if result.is_resolved() {
                    resolved.insert(address, result);
                }
            }
        }
        Ok(resolved)
    }

    #[instrument(skip_all, fields(sectors = sectors.len()))]
    pub async fn run(&self, sectors: &[Sector]) -> Result<GeocodeReport> {
        let limiter = RateLimiter::new(self.settings.delay());
        info!("Pacing provider requests at least {:?} apart", limiter.min_interval());
        let policy = RetryPolicy::from_config(&self.settings);
        let mut shared = self.preload_resolved()?;
        let mut report = GeocodeReport::default();

        for sector in sectors {
            let merged = read_merged_locations(&self.paths.merged_path(sector.as_str()))?;

            // Unique addresses in table order, with the first province seen
            let mut seen = HashSet::new();
            let addresses: Vec<(String, Option<String>)> = merged
                .rows
                .iter()
                .filter(|row| !row.full_address.is_empty())
                .filter(|row| seen.insert(row.full_address.clone()))
                .map(|row| (row.full_address.clone(), row.province.clone()))
                .collect();
            report.unique_addresses += addresses.len();

            let mut cache = GeocodeCache::open(&self.paths.geocoded_path(sector.as_str()))?;
            info!(
                "🌍 Geocoding {} unique {} addresses ({} cached)",
                addresses.len(),
                sector,
                cache.entry_count()
            );

            let progress_every = self.settings.progress_every.max(1);
            for (done, (address, province)) in addresses.iter().enumerate() {
                if cache.is_resolved(address) {
                    report.cached += 1;
                    metrics::geocode::cache_hit("sector");
                } else if let Some(known) = shared.get(address) {
                    cache.record(known.clone())?;
                    report.copied += 1;
                    metrics::geocode::cache_hit("other_sector");
                } else {
                    let result = self
                        .query(&limiter, &policy, address, province.as_deref(), &mut report)
                        .await?;
                    cache.record(result.clone())?;
                    if result.is_resolved() {
                        shared.insert(address.clone(), result);
                    }
                }

                if (done + 1) % progress_every == 0 {
                    info!("📍 {}: {}/{} addresses processed", sector, done + 1, addresses.len());
                }
            }
            info!("✅ {} geocode table at {}", sector, cache.path().display());
        }

        info!(
            unique = report.unique_addresses,
            cached = report.cached,
            copied = report.copied,
            requests = report.requests,
            ok = report.ok,
            not_found = report.not_found,
            failed = report.failed,
            "Geocoding complete"
        );
        if report.failed > 0 {
            warn!("{} addresses failed to geocode and will be retried on the next run", report.failed);
        }
        Ok(report)
    }

    /// Resolve one address through the provider. Fatal provider conditions
    /// abort the stage; everything else becomes a recorded result.
    async fn query(
        &self,
        limiter: &RateLimiter,
        policy: &RetryPolicy,
        address: &str,
        province: Option<&str>,
        report: &mut GeocodeReport,
    ) -> Result<GeocodeResult> {
        let query = geocode_query(address, province, &self.settings.region_suffix);
        let started = Instant::now();
        let attempted = geocode_with_retries(self.geocoder.as_ref(), limiter, policy, &query).await;
        metrics::geocode::request_duration(started.elapsed().as_secs_f64());
        for _ in 0..attempted.attempts {
            metrics::geocode::request();
        }
        report.requests += attempted.attempts as usize;

        let result = match attempted.result {
            Ok(hit) => {
                report.ok += 1;
                GeocodeResult::resolved(address, hit.latitude, hit.longitude, hit.quality)
            }
            Err(GeocodeError::NotFound) => {
                report.not_found += 1;
                GeocodeResult::failed(address, GeocodeStatus::NotFound, "ZERO_RESULTS")
            }
            // The provider rejected the query itself; asking again cannot help
            Err(GeocodeError::Invalid(reason)) => {
                report.not_found += 1;
                GeocodeResult::failed(address, GeocodeStatus::NotFound, reason)
            }
            Err(GeocodeError::Transient(reason)) => {
                report.failed += 1;
                warn!("Giving up on '{}' after {} attempts: {}", address, attempted.attempts, reason);
                GeocodeResult::failed(address, GeocodeStatus::Error, reason)
            }
            Err(GeocodeError::Fatal(message)) => {
                return Err(PipelineError::Provider { message }.into());
            }
        };
        metrics::geocode::result(result.status.as_str());
        Ok(result)
    }
}
