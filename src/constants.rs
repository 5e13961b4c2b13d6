/// File naming and column constants shared by all three stages.
/// Stage hand-off happens through files, so these names are the contract
/// between Merger, Geocoder and Refiner.

// Default input files (relative to `paths.raw_dir`)
pub const DEFAULT_ORGANIZATIONS_FILE: &str = "ORGANISATIES.csv";
pub const DEFAULT_EDUCATION_FILE: &str = "OPLEIDINGEN.csv";

// Default directories
pub const DEFAULT_RAW_DIR: &str = "data/raw";
pub const DEFAULT_MERGED_DIR: &str = "data/processed/final";
pub const DEFAULT_GEOCODED_DIR: &str = "data/geocoded";
pub const DEFAULT_OUTPUT_DIR: &str = "data/processed/final";
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Daily-rotated JSON log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "edu_locations.log";
/// Filter used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "edu_locations=info,warn";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prometheus text snapshot written to the log directory at the end of a run
pub const METRICS_SNAPSHOT_FILE: &str = "metrics.prom";

// Geocoding provider defaults
pub const DEFAULT_GEOCODER_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_REGION_SUFFIX: &str = "Netherlands";

// Organization registry columns
pub const COL_ORG_ID: &str = "NR_ADMINISTRATIE";
pub const COL_FUNCTION_CODE: &str = "CODE_FUNCTIE";
pub const COL_TYPE_CODE: &str = "CODE_SOORT";
pub const COL_NAME: &str = "NAAM_VOLLEDIG";
pub const COL_STREET: &str = "NAAM_STRAAT_VEST";
pub const COL_HOUSE_NUMBER: &str = "NR_HUIS_VEST";
pub const COL_POSTAL_CODE: &str = "POSTCODE_VEST";
pub const COL_CITY: &str = "NAAM_PLAATS_VEST";
pub const COL_PROVINCE: &str = "PROVINCIE_VEST";
pub const COL_START_DATE: &str = "DT_IN_BEDRIJF";
pub const COL_END_DATE: &str = "DT_UIT_BEDRIJF";

pub const ORGANIZATION_COLUMNS: &[&str] = &[
    COL_ORG_ID,
    COL_FUNCTION_CODE,
    COL_TYPE_CODE,
    COL_NAME,
    COL_STREET,
    COL_HOUSE_NUMBER,
    COL_POSTAL_CODE,
    COL_CITY,
    COL_PROVINCE,
    COL_START_DATE,
    COL_END_DATE,
];

// Program registry columns
pub const EDUCATION_COLUMNS: &[&str] = &[
    "NR_ADMINISTRATIE",
    "OPLEIDINGSCODE",
    "ONDERWIJSTYPE",
    "ONDERWIJSSECTOR",
    "BEGINDATUM",
    "EINDDATUM",
];

// Relation registry columns
pub const RELATION_COLUMNS: &[&str] = &[
    "NR_ADMIN_VAN",
    "NR_ADMIN_NAAR",
    "CODE_RELATIE",
    "DT_BEGIN_RELATIE",
    "DT_EINDE_RELATIE",
];

// Intermediate table columns
pub const COL_FULL_ADDRESS: &str = "full_address";

pub const MERGED_COLUMNS: &[&str] = &[
    "identifiers",
    "location_type",
    "sector",
    "temporal_status",
    COL_FULL_ADDRESS,
    "start_date",
    "end_date",
];

pub const GEOCODED_COLUMNS: &[&str] = &[COL_FULL_ADDRESS, "latitude", "longitude", "status"];

// Full headers, in struct field order
pub const MERGED_HEADER: &[&str] = &[
    "identifiers",
    "name",
    "function_code",
    "location_type",
    "sector",
    "temporal_status",
    COL_FULL_ADDRESS,
    "postal_code",
    "city",
    "province",
    "start_date",
    "end_date",
];

pub const GEOCODED_HEADER: &[&str] = &[
    COL_FULL_ADDRESS,
    "latitude",
    "longitude",
    "status",
    "quality",
    "reason",
];

pub const REFINED_HEADER: &[&str] = &[
    "identifiers",
    "name",
    "function_code",
    "location_type",
    "sector",
    COL_FULL_ADDRESS,
    "postal_code",
    "city",
    "province",
    "start_date",
    "end_date",
    "latitude",
    "longitude",
    "geocode_status",
    "geocode_quality",
    "location_status",
    "facility_type",
    "years_of_operation",
    "decade_opened",
    "decade_closed",
    "operation_period",
];

/// `{sector}_education_locations.csv`
pub fn merged_file_name(sector: &str) -> String {
    format!("{sector}_education_locations.csv")
}

/// `geocoded_{sector}_locations.csv`
pub fn geocoded_file_name(sector: &str) -> String {
    format!("geocoded_{sector}_locations.csv")
}

/// `cleaned_{sector}_for_qgis.csv`
pub fn refined_file_name(sector: &str) -> String {
    format!("cleaned_{sector}_for_qgis.csv")
}
