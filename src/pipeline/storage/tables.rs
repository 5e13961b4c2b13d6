use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{MERGED_COLUMNS, MERGED_HEADER};
use crate::domain::{MergedLocation, Sector, TemporalStatus};
use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::raw_table::read_rows;
use crate::pipeline::processing::normalize::DateCoercion;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `rows` under `header` to `path`. The header is written even when
/// there are no rows. The file is replaced in one rename so a crash never
/// leaves a half-written table behind.
pub fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)?;
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MergedRow {
    identifiers: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    function_code: Option<String>,
    location_type: Option<String>,
    sector: String,
    // Recomputed from end_date on read
    #[allow(dead_code)]
    temporal_status: Option<String>,
    full_address: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    province: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// A merged table read back from disk.
#[derive(Debug, Clone, Default)]
pub struct MergedTable {
    pub rows: Vec<MergedLocation>,
    pub malformed_dates: usize,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Read a merged sector table. Malformed dates are coerced to null and
/// counted rather than failing the row.
pub fn read_merged_locations(path: &Path) -> Result<MergedTable> {
    let raw = read_rows::<MergedRow>(path, MERGED_COLUMNS)?.rows;
    let mut dates = DateCoercion::default();
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw {
        let sector: Sector = row.sector.parse().map_err(|e: String| PipelineError::Schema {
            path: path.to_path_buf(),
            message: format!("sector column: {}", e),
        })?;
        let end_date = dates.coerce(row.end_date.as_deref());
        rows.push(MergedLocation {
            identifiers: row.identifiers.unwrap_or_default(),
            name: non_empty(row.name),
            function_code: non_empty(row.function_code),
            location_type: non_empty(row.location_type),
            sector,
            temporal_status: TemporalStatus::from_end_date(end_date),
            full_address: row.full_address.unwrap_or_default(),
            postal_code: non_empty(row.postal_code),
            city: non_empty(row.city),
            province: non_empty(row.province),
            start_date: dates.coerce(row.start_date.as_deref()),
            end_date,
        });
    }

    if dates.malformed > 0 {
        warn!(
            "{} malformed dates in {} coerced to null",
            dates.malformed,
            path.display()
        );
    }
    Ok(MergedTable {
        rows,
        malformed_dates: dates.malformed,
    })
}

pub fn write_merged_locations(path: &Path, rows: &[MergedLocation]) -> Result<()> {
    write_table(path, MERGED_HEADER, rows)
}
