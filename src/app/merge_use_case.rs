use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::config::PathsConfig;
use crate::domain::{RelationRecord, Sector};
use crate::observability::metrics;
use crate::pipeline::ingestion::{load_education, load_organizations, load_relations, LoadedTable};
use crate::pipeline::processing::merge::{merge_locations, MergeReport};
use crate::pipeline::storage::write_merged_locations;
use crate::taxonomy;

/// Use case for merging the raw registries into per-sector location tables
pub struct MergeUseCase {
    paths: PathsConfig,
}

impl MergeUseCase {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Load, merge and write one table per selected sector. Tables are
    /// written even when empty so the downstream stages find a file.
    #[instrument(skip_all, fields(sectors = sectors.len()))]
    pub fn run(&self, sectors: &[Sector]) -> Result<MergeReport> {
        info!("Merging with taxonomy {}", taxonomy::TAXONOMY_VERSION);
        let organizations = load_organizations(&self.paths.organizations_path())?;
        let education = load_education(&self.paths.education_path())?;
        let relations = match self.paths.relations_path() {
            Some(path) => load_relations(&path)?,
            None => {
                info!("No relation registry configured, parent sector fallback disabled");
                LoadedTable::<RelationRecord>::empty()
            }
        };

        let (mut tables, mut report) =
            merge_locations(&organizations.records, &education.records, &relations.records);
        report.malformed_dates =
            organizations.malformed_dates + education.malformed_dates + relations.malformed_dates;
        report.unreadable_rows =
            organizations.unreadable_rows + education.unreadable_rows + relations.unreadable_rows;
        report.unlinked_rows = education.unlinked_rows + relations.unlinked_rows;

        for sector in sectors {
            let rows = tables.remove(sector).unwrap_or_default();
            if sector.is_known() {
                debug!("{} type codes: {:?}", sector, taxonomy::codes_for_sector(*sector));
            } else if !rows.is_empty() {
                warn!("{} locations written to the unknown partition for review", rows.len());
            }
            let path = self.paths.merged_path(sector.as_str());
            write_merged_locations(&path, &rows)?;
            metrics::merge::locations_written(sector.as_str(), rows.len());
            info!("💾 {} {} locations -> {}", rows.len(), sector, path.display());
        }
        // Partitions outside the selection are computed but not written
        report.locations_per_sector.retain(|sector, _| sectors.contains(sector));

        metrics::merge::rows_read(report.rows_read);
        metrics::merge::rows_dropped("missing_identifier", report.dropped_missing_identifier);
        metrics::merge::rows_dropped("missing_address", report.dropped_missing_address);
        metrics::merge::rows_dropped("unreadable", report.unreadable_rows);
        metrics::merge::rows_dropped("unlinked", report.unlinked_rows);
        metrics::merge::malformed_dates(report.malformed_dates);
        metrics::merge::unknown_sector(report.unknown_sector);

        if report.rows_dropped() > 0 {
            warn!(
                "Dropped {} rows ({} without identifier, {} without street and postal code)",
                report.rows_dropped(),
                report.dropped_missing_identifier,
                report.dropped_missing_address
            );
        }
        if report.unreadable_rows > 0 {
            warn!("{} registry rows could not be decoded and were skipped", report.unreadable_rows);
        }
        if report.unlinked_rows > 0 {
            warn!(
                "{} program or relation rows could not be linked to an organization",
                report.unlinked_rows
            );
        }
        if report.unknown_sector > 0 {
            warn!(
                "{} locations could not be assigned a sector and went to the unknown partition",
                report.unknown_sector
            );
        }
        info!(
            rows_read = report.rows_read,
            collapsed = report.collapsed_rows,
            malformed_dates = report.malformed_dates,
            from_programs = report.sector_from_programs,
            from_parent = report.sector_from_parent,
            "Merge complete"
        );
        Ok(report)
    }
}
