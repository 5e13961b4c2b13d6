use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::constants::{EDUCATION_COLUMNS, ORGANIZATION_COLUMNS, RELATION_COLUMNS};
use crate::domain::{EducationRecord, OrganizationRecord, RelationRecord};
use crate::error::Result;
use crate::pipeline::ingestion::raw_table::read_rows;
use crate::pipeline::processing::normalize::DateCoercion;
use crate::taxonomy;

#[derive(Debug, Deserialize)]
struct OrganizationRow {
    #[serde(rename = "NR_ADMINISTRATIE")]
    identifier: Option<String>,
    #[serde(rename = "CODE_FUNCTIE")]
    function_code: Option<String>,
    #[serde(rename = "CODE_SOORT")]
    type_code: Option<String>,
    #[serde(rename = "NAAM_VOLLEDIG")]
    name: Option<String>,
    #[serde(rename = "NAAM_STRAAT_VEST")]
    street: Option<String>,
    #[serde(rename = "NR_HUIS_VEST")]
    house_number: Option<String>,
    #[serde(rename = "NR_HUIS_TOEV_VEST", default)]
    house_number_addition: Option<String>,
    #[serde(rename = "POSTCODE_VEST")]
    postal_code: Option<String>,
    #[serde(rename = "NAAM_PLAATS_VEST")]
    city: Option<String>,
    #[serde(rename = "PROVINCIE_VEST")]
    province: Option<String>,
    #[serde(rename = "DT_IN_BEDRIJF")]
    start_date: Option<String>,
    #[serde(rename = "DT_UIT_BEDRIJF")]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EducationRow {
    #[serde(rename = "NR_ADMINISTRATIE")]
    identifier: Option<String>,
    #[serde(rename = "OPLEIDINGSCODE")]
    program_code: Option<String>,
    #[serde(rename = "ONDERWIJSTYPE")]
    education_type: Option<String>,
    #[serde(rename = "ONDERWIJSSECTOR")]
    sector: Option<String>,
    #[serde(rename = "BEGINDATUM")]
    start_date: Option<String>,
    #[serde(rename = "EINDDATUM")]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelationRow {
    #[serde(rename = "NR_ADMIN_VAN")]
    parent: Option<String>,
    #[serde(rename = "NR_ADMIN_NAAR")]
    child: Option<String>,
    #[serde(rename = "CODE_RELATIE")]
    relation_code: Option<String>,
    #[serde(rename = "DT_BEGIN_RELATIE")]
    start_date: Option<String>,
    #[serde(rename = "DT_EINDE_RELATIE")]
    end_date: Option<String>,
}

/// A loaded registry plus the per-row problems recovered while loading it.
#[derive(Debug, Clone)]
pub struct LoadedTable<T> {
    pub records: Vec<T>,
    pub malformed_dates: usize,
    /// Rows skipped because they could not be linked (no identifier)
    pub unlinked_rows: usize,
    /// Rows the reader could not decode at all
    pub unreadable_rows: usize,
}

impl<T> LoadedTable<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            malformed_dates: 0,
            unlinked_rows: 0,
            unreadable_rows: 0,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_organizations(path: &Path) -> Result<LoadedTable<OrganizationRecord>> {
    let decoded = read_rows::<OrganizationRow>(path, ORGANIZATION_COLUMNS)?;
    let unreadable = decoded.unreadable;
    let rows = decoded.rows;
    let mut dates = DateCoercion::default();

    let records: Vec<OrganizationRecord> = rows
        .into_iter()
        .map(|row| OrganizationRecord {
            identifier: clean(row.identifier),
            function_code: clean(row.function_code),
            type_code: clean(row.type_code),
            name: clean(row.name),
            street: clean(row.street),
            house_number: clean(row.house_number),
            house_number_addition: clean(row.house_number_addition),
            postal_code: clean(row.postal_code),
            city: clean(row.city),
            province: clean(row.province),
            start_date: dates.coerce(row.start_date.as_deref()),
            end_date: dates.coerce(row.end_date.as_deref()),
        })
        .collect();

    if dates.malformed > 0 {
        warn!("{} malformed organization dates coerced to null", dates.malformed);
    }
    info!("Loaded {} organization records", records.len());

    Ok(LoadedTable {
        records,
        malformed_dates: dates.malformed,
        unlinked_rows: 0,
        unreadable_rows: unreadable,
    })
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_education(path: &Path) -> Result<LoadedTable<EducationRecord>> {
    let decoded = read_rows::<EducationRow>(path, EDUCATION_COLUMNS)?;
    let unreadable = decoded.unreadable;
    let rows = decoded.rows;
    let mut dates = DateCoercion::default();
    let mut unlinked = 0;
    let mut unclassified = 0;
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(identifier) = clean(row.identifier) else {
            unlinked += 1;
            continue;
        };
        let sector = clean(row.sector).and_then(|s| taxonomy::sector_for_registry_code(&s));
        if sector.is_none() {
            unclassified += 1;
        }
        records.push(EducationRecord {
            identifier,
            program_code: clean(row.program_code),
            education_type: clean(row.education_type),
            sector,
            start_date: dates.coerce(row.start_date.as_deref()),
            end_date: dates.coerce(row.end_date.as_deref()),
        });
    }

    if unlinked > 0 {
        warn!("{} program rows without an organization identifier skipped", unlinked);
    }
    if unclassified > 0 {
        warn!("{} program rows carry no recognised sector code", unclassified);
    }
    if dates.malformed > 0 {
        warn!("{} malformed program dates coerced to null", dates.malformed);
    }
    info!("Loaded {} program records", records.len());

    Ok(LoadedTable {
        records,
        malformed_dates: dates.malformed,
        unlinked_rows: unlinked,
        unreadable_rows: unreadable,
    })
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_relations(path: &Path) -> Result<LoadedTable<RelationRecord>> {
    let decoded = read_rows::<RelationRow>(path, RELATION_COLUMNS)?;
    let unreadable = decoded.unreadable;
    let rows = decoded.rows;
    let mut dates = DateCoercion::default();
    let mut unlinked = 0;
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let (Some(parent), Some(child)) = (clean(row.parent), clean(row.child)) else {
            unlinked += 1;
            continue;
        };
        records.push(RelationRecord {
            parent,
            child,
            relation_code: clean(row.relation_code),
            start_date: dates.coerce(row.start_date.as_deref()),
            end_date: dates.coerce(row.end_date.as_deref()),
        });
    }

    if unlinked > 0 {
        warn!("{} relation rows missing parent or child skipped", unlinked);
    }
    info!("Loaded {} relation records", records.len());

    Ok(LoadedTable {
        records,
        malformed_dates: dates.malformed,
        unlinked_rows: unlinked,
        unreadable_rows: unreadable,
    })
}
