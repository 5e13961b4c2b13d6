use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};

use crate::config::PathsConfig;
use crate::constants::REFINED_HEADER;
use crate::domain::Sector;
use crate::observability::metrics;
use crate::pipeline::geocoding::read_geocoded;
use crate::pipeline::processing::refine::{refine_all, RefineSummary};
use crate::pipeline::storage::{read_merged_locations, write_table};

/// Use case for joining merged locations with coordinates into final tables
pub struct RefineUseCase {
    paths: PathsConfig,
}

impl RefineUseCase {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    #[instrument(skip_all, fields(sectors = sectors.len()))]
    pub fn run(&self, sectors: &[Sector]) -> Result<BTreeMap<Sector, RefineSummary>> {
        let mut summaries = BTreeMap::new();

        for sector in sectors {
            let merged = read_merged_locations(&self.paths.merged_path(sector.as_str()))?;

            let geocoded_path = self.paths.geocoded_path(sector.as_str());
            let geocodes = if geocoded_path.exists() {
                read_geocoded(&geocoded_path)?
            } else {
                warn!(
                    "No geocode table at {}, all {} locations will be ungeocoded",
                    geocoded_path.display(),
                    sector
                );
                HashMap::new()
            };

            let refined = refine_all(&merged.rows, &geocodes);
            let output = self.paths.refined_path(sector.as_str());
            write_table(&output, REFINED_HEADER, &refined)?;

            let summary = RefineSummary::from_rows(&refined);
            let ungeocoded = summary
                .by_join_status
                .get("ungeocoded")
                .copied()
                .unwrap_or(0);
            metrics::refine::rows_written(sector.as_str(), refined.len());
            metrics::refine::ungeocoded(ungeocoded);

            log_summary(*sector, &summary);
            if merged.malformed_dates > 0 {
                warn!(
                    "{} malformed dates in the {} table were treated as unknown",
                    merged.malformed_dates, sector
                );
            }
            info!("💾 {} refined {} locations -> {}", refined.len(), sector, output.display());
            summaries.insert(*sector, summary);
        }
        Ok(summaries)
    }
}

fn log_summary(sector: Sector, summary: &RefineSummary) {
    info!(
        sector = sector.as_str(),
        total = summary.total,
        active = summary.active,
        inactive = summary.inactive,
        coverage_pct = summary.coverage(),
        "Refined {} locations",
        sector
    );
    for (facility, count) in &summary.by_facility_type {
        info!("  {}: {}", facility, count);
    }
    for (decade, count) in &summary.opened_per_decade {
        info!("  opened in the {}s: {}", decade, count);
    }
    if let Some(average) = summary.average_closed_years {
        info!("  closed locations operated {:.1} years on average", average);
    }
}
