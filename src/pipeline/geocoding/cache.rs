use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{GEOCODED_COLUMNS, GEOCODED_HEADER};
use crate::domain::{GeocodeResult, GeocodeStatus};
use crate::error::{PipelineError, Result};

fn parse_status(value: &str) -> Option<GeocodeStatus> {
    match value.trim() {
        "ok" => Some(GeocodeStatus::Ok),
        "not_found" => Some(GeocodeStatus::NotFound),
        "error" => Some(GeocodeStatus::Error),
        _ => None,
    }
}

struct Columns {
    address: usize,
    latitude: usize,
    longitude: usize,
    status: usize,
    quality: Option<usize>,
    reason: Option<usize>,
}

impl Columns {
    fn from_headers(path: &Path, headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
        };
        let missing: Vec<&str> = GEOCODED_COLUMNS
            .iter()
            .filter(|c| find(c).is_none())
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Schema {
                path: path.to_path_buf(),
                message: format!("missing required columns: {}", missing.join(", ")),
            });
        }
        Ok(Self {
            address: find("full_address").unwrap_or(0),
            latitude: find("latitude").unwrap_or(1),
            longitude: find("longitude").unwrap_or(2),
            status: find("status").unwrap_or(3),
            quality: find("quality"),
            reason: find("reason"),
        })
    }

    fn parse(&self, record: &StringRecord) -> Option<GeocodeResult> {
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let address = text(Some(self.address))?;
        let status = parse_status(record.get(self.status)?)?;
        let latitude = text(Some(self.latitude)).map(|v| v.parse::<f64>()).transpose().ok()?;
        let longitude = text(Some(self.longitude)).map(|v| v.parse::<f64>()).transpose().ok()?;
        if status == GeocodeStatus::Ok && (latitude.is_none() || longitude.is_none()) {
            return None;
        }
        Some(GeocodeResult {
            full_address: address,
            latitude,
            longitude,
            status,
            quality: text(self.quality),
            reason: text(self.reason),
        })
    }
}

/// Read a geocode table into a map keyed by `full_address`. Later rows win
/// over earlier ones. Rows that cannot be parsed, such as a final line torn
/// by an interrupted run, are skipped with a warning.
fn load_entries(path: &Path) -> Result<HashMap<String, GeocodeResult>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(HashMap::new());
    }
    let columns = Columns::from_headers(path, &headers)?;

    let mut entries = HashMap::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        match record.ok().and_then(|r| columns.parse(&r)) {
            Some(result) => {
                entries.insert(result.full_address.clone(), result);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("Skipped {} unreadable rows in {}", skipped, path.display());
    }
    Ok(entries)
}

/// Read-only view of a geocode table, for joining.
pub fn read_geocoded(path: &Path) -> Result<HashMap<String, GeocodeResult>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    load_entries(path)
}

/// Persistent, append-only geocode cache for one sector.
///
/// Every result is written and flushed as soon as it is known, so an
/// interrupted run loses at most the address in flight. Reopening the cache
/// restores everything written so far.
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, GeocodeResult>,
    writer: Option<csv::Writer<File>>,
}

impl GeocodeCache {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            load_entries(path)?
        } else {
            HashMap::new()
        };
        if !entries.is_empty() {
            info!(
                "Resuming from {} cached results in {}",
                entries.len(),
                path.display()
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            writer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, full_address: &str) -> Option<&GeocodeResult> {
        self.entries.get(full_address)
    }

    /// True when the address already has a final answer (ok or not found).
    pub fn is_resolved(&self, full_address: &str) -> bool {
        self.get(full_address).map(GeocodeResult::is_resolved).unwrap_or(false)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>> {
        if self.writer.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&self.path)?;
            let dropped = truncate_torn_tail(&mut file)?;
            if dropped > 0 {
                warn!(
                    "Dropped {} bytes of a torn final row in {}",
                    dropped,
                    self.path.display()
                );
            }
            let needs_header = file.metadata()?.len() == 0;

            let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
            if needs_header {
                writer.write_record(GEOCODED_HEADER)?;
                writer.flush()?;
            }
            debug!("Opened geocode cache {} for append", self.path.display());
            self.writer = Some(writer);
        }
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(PipelineError::Config(format!(
                "geocode cache {} is not writable",
                self.path.display()
            ))),
        }
    }

    /// Persist one result and make it visible to later lookups.
    pub fn record(&mut self, result: GeocodeResult) -> Result<()> {
        let writer = self.writer()?;
        writer.serialize(&result)?;
        writer.flush()?;
        self.entries.insert(result.full_address.clone(), result);
        Ok(())
    }
}

/// Cut the file back to just after its last newline and return the number of
/// bytes removed. A torn row may hold an open quote, so terminating it with a
/// newline would make the reader swallow the next row.
fn truncate_torn_tail(file: &mut File) -> Result<u64> {
    const CHUNK: u64 = 4096;
    let len = file.metadata()?.len();
    let mut end = len;
    let mut buf = vec![0u8; CHUNK as usize];

    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            let keep = start + pos as u64 + 1;
            if keep < len {
                file.set_len(keep)?;
            }
            return Ok(len - keep);
        }
        end = start;
    }

    // Not even the header made it to disk
    if len > 0 {
        file.set_len(0)?;
    }
    Ok(len)
}
