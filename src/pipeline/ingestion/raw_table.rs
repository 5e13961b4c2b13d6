use csv::{Reader, ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Open a comma-separated table and verify its header carries every
/// `required` column. A missing file or column is a structural error.
pub fn open_table(path: &Path, required: &[&str]) -> Result<Reader<File>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        // Short or long rows are decoded against the header, missing cells as null
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    check_headers(path, &headers, required)?;
    debug!("Opened {} with {} columns", path.display(), headers.len());
    Ok(reader)
}

fn check_headers(path: &Path, headers: &StringRecord, required: &[&str]) -> Result<()> {
    // Some exports carry a UTF-8 byte order mark on the first header
    let present: Vec<&str> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .filter(|col| !present.contains(col))
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema {
            path: path.to_path_buf(),
            message: format!("missing required columns: {}", missing.join(", ")),
        })
    }
}

/// Rows decoded from one table plus the count of rows that could not be.
#[derive(Debug)]
pub struct DecodedRows<T> {
    pub rows: Vec<T>,
    pub unreadable: usize,
}

/// Read every row of a table into `T`. A row that cannot be decoded is
/// skipped and counted; only a missing file or column fails the table.
pub fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<DecodedRows<T>> {
    let mut reader = open_table(path, required)?;
    let mut headers = reader.headers()?.clone();
    if let Some(first) = headers.get(0) {
        if first.starts_with('\u{feff}') {
            let cleaned: StringRecord = headers
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}'))
                .collect();
            headers = cleaned;
        }
    }

    let mut rows = Vec::new();
    let mut unreadable = 0;
    for (index, record) in reader.records().enumerate() {
        // +2: one for the header row, one for 1-based numbering
        let line = index + 2;
        let decoded = record
            .map_err(|e| e.to_string())
            .and_then(|r| r.deserialize::<T>(Some(&headers)).map_err(|e| e.to_string()));
        match decoded {
            Ok(row) => rows.push(row),
            Err(e) => {
                debug!("Row {} of {} skipped: {}", line, path.display(), e);
                unreadable += 1;
            }
        }
    }
    if unreadable > 0 {
        warn!("{} unreadable rows skipped in {}", unreadable, path.display());
    }
    Ok(DecodedRows { rows, unreadable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(rename = "ID")]
        id: Option<String>,
        #[serde(rename = "NAME")]
        name: Option<String>,
    }

    #[test]
    fn test_missing_file_is_structural() {
        let err = open_table(Path::new("/no/such/table.csv"), &["ID"]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_missing_column_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "ID,OTHER\n1,x\n").unwrap();
        let err = read_rows::<Row>(&path, &["ID", "NAME"]).unwrap_err();
        match err {
            PipelineError::Schema { message, .. } => assert!(message.contains("NAME")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reads_rows_with_bom_and_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "\u{feff}ID,NAME,EXTRA\n1,Alpha,x\n,Beta,y\n").unwrap();
        let rows = read_rows::<Row>(&path, &["ID", "NAME"]).unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_deref(), Some("1"));
        assert_eq!(rows[1].id, None);
        assert_eq!(rows[1].name.as_deref(), Some("Beta"));
    }

    #[test]
    fn test_ragged_rows_do_not_fail_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "ID,NAME,EXTRA\n1,Alpha,x\n2\n3,Gamma,z,surplus\n").unwrap();
        let decoded = read_rows::<Row>(&path, &["ID", "NAME"]).unwrap();
        assert_eq!(decoded.unreadable, 0);
        assert_eq!(decoded.rows.len(), 3);
        assert_eq!(decoded.rows[1].id.as_deref(), Some("2"));
        assert_eq!(decoded.rows[1].name, None);
        assert_eq!(decoded.rows[2].name.as_deref(), Some("Gamma"));
    }

    #[test]
    fn test_undecodable_row_is_counted_and_skipped() {
        #[derive(Debug, Deserialize)]
        struct Numbered {
            #[serde(rename = "ID")]
            id: u32,
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "ID\n1\nnot-a-number\n3\n").unwrap();
        let decoded = read_rows::<Numbered>(&path, &["ID"]).unwrap();
        assert_eq!(decoded.unreadable, 1);
        assert_eq!(decoded.rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
