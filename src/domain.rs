//! Domain data shapes shared by the merge, geocode and refine stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Education sector partition. `Unknown` holds records whose type code could
/// not be classified; they are retained and flagged, never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Primary,
    Secondary,
    Vocational,
    Higher,
    Unknown,
}

impl Sector {
    pub const ALL: [Sector; 5] = [
        Sector::Primary,
        Sector::Secondary,
        Sector::Vocational,
        Sector::Higher,
        Sector::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Primary => "primary",
            Sector::Secondary => "secondary",
            Sector::Vocational => "vocational",
            Sector::Higher => "higher",
            Sector::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Sector::Unknown)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Sector::Primary),
            "secondary" => Ok(Sector::Secondary),
            "vocational" => Ok(Sector::Vocational),
            "higher" => Ok(Sector::Higher),
            "unknown" => Ok(Sector::Unknown),
            other => Err(format!("unknown sector '{other}'")),
        }
    }
}

/// Whether a location is still operating, derived purely from end date presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalStatus {
    Active,
    Inactive,
}

impl TemporalStatus {
    pub fn from_end_date(end_date: Option<NaiveDate>) -> Self {
        match end_date {
            None => TemporalStatus::Active,
            Some(_) => TemporalStatus::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalStatus::Active => "active",
            TemporalStatus::Inactive => "inactive",
        }
    }
}

/// One row of the organization registry after date coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationRecord {
    pub identifier: Option<String>,
    pub function_code: Option<String>,
    pub type_code: Option<String>,
    pub name: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub house_number_addition: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// `None` means the organization is still operating
    pub end_date: Option<NaiveDate>,
}

/// One row of the program registry.
#[derive(Debug, Clone, PartialEq)]
pub struct EducationRecord {
    pub identifier: String,
    pub program_code: Option<String>,
    pub education_type: Option<String>,
    /// Sector classification from the registry's own sector column
    pub sector: Option<Sector>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// One row of the relation/transition registry: `parent` governs `child`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRecord {
    pub parent: String,
    pub child: String,
    pub relation_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Separator used for the merged identifier list.
pub const IDENTIFIER_SEPARATOR: char = ';';

/// One deduplicated location, unique by (full_address, sector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedLocation {
    /// Sorted, `;`-separated identifiers of every collapsed organization row
    pub identifiers: String,
    pub name: Option<String>,
    pub function_code: Option<String>,
    /// Type code (`CODE_SOORT`) of the representative row
    pub location_type: Option<String>,
    pub sector: Sector,
    pub temporal_status: TemporalStatus,
    pub full_address: String,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    Ok,
    NotFound,
    Error,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Ok => "ok",
            GeocodeStatus::NotFound => "not_found",
            GeocodeStatus::Error => "error",
        }
    }
}

/// Geocoding outcome for one standardized address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub full_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: GeocodeStatus,
    /// Provider precision flag, e.g. `rooftop` or `approximate;partial`
    pub quality: Option<String>,
    pub reason: Option<String>,
}

impl GeocodeResult {
    pub fn resolved(full_address: &str, latitude: f64, longitude: f64, quality: Option<String>) -> Self {
        Self {
            full_address: full_address.to_string(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            status: GeocodeStatus::Ok,
            quality,
            reason: None,
        }
    }

    pub fn failed(full_address: &str, status: GeocodeStatus, reason: impl Into<String>) -> Self {
        Self {
            full_address: full_address.to_string(),
            latitude: None,
            longitude: None,
            status,
            quality: None,
            reason: Some(reason.into()),
        }
    }

    /// Ok and not-found are final answers from the provider; errors are not.
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, GeocodeStatus::Ok | GeocodeStatus::NotFound)
    }
}

/// Join outcome of a merged location against the geocode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    Ok,
    NotFound,
    Error,
    Ungeocoded,
}

impl From<GeocodeStatus> for JoinStatus {
    fn from(status: GeocodeStatus) -> Self {
        match status {
            GeocodeStatus::Ok => JoinStatus::Ok,
            GeocodeStatus::NotFound => JoinStatus::NotFound,
            GeocodeStatus::Error => JoinStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearsOfOperation {
    Years(u32),
    Ongoing,
}

impl fmt::Display for YearsOfOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearsOfOperation::Years(n) => write!(f, "{n}"),
            YearsOfOperation::Ongoing => f.write_str("ongoing"),
        }
    }
}

impl Serialize for YearsOfOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Final QGIS-ready row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinedLocation {
    pub identifiers: String,
    pub name: Option<String>,
    pub function_code: Option<String>,
    pub location_type: Option<String>,
    pub sector: Sector,
    pub full_address: String,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_status: JoinStatus,
    pub geocode_quality: Option<String>,
    pub location_status: TemporalStatus,
    pub facility_type: &'static str,
    pub years_of_operation: Option<YearsOfOperation>,
    pub decade_opened: Option<i32>,
    pub decade_closed: Option<i32>,
    pub operation_period: Option<String>,
}
