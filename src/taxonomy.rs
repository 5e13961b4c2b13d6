//! Type-code taxonomy for DUO organization records.
//!
//! One static table maps a `CODE_SOORT` value to its education sector and a
//! human-facing facility label. Sector assignment in the merge stage and
//! facility categorization in the refine stage both read from it.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::domain::Sector;

/// Bump when codes or labels change so outputs can be traced to a table revision.
pub const TAXONOMY_VERSION: &str = "duo-2025.1";

/// Label used for codes without a facility mapping.
pub const OTHER_FACILITY: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCodeEntry {
    pub sector: Sector,
    pub facility_type: &'static str,
}

const ENTRIES: &[(&str, Sector, &str)] = &[
    // primary
    ("BAS", Sector::Primary, "Regular Primary School"),
    ("SBAS", Sector::Primary, "Special Primary Education"),
    ("SPEC", Sector::Primary, "Special Education"),
    ("VST", Sector::Primary, "Primary Branch Location"),
    // secondary
    ("VOS", Sector::Secondary, "Regular Secondary School"),
    ("PROS", Sector::Secondary, "Practical Education"),
    ("AOCV", Sector::Secondary, "Agricultural Education"),
    ("VSTS", Sector::Secondary, "Secondary Technical School"),
    ("VSTZ", Sector::Secondary, "Secondary Branch Location"),
    // vocational
    ("MBO", Sector::Vocational, "Vocational Institution"),
    ("VE", Sector::Vocational, "Adult Education"),
    ("ROC", Sector::Vocational, "Regional Education Center"),
    ("ROCV", Sector::Vocational, "Specialized Regional Center"),
    ("VAK", Sector::Vocational, "Vocational School"),
    ("VAKV", Sector::Vocational, "Advanced Vocational"),
    ("ILOC", Sector::Vocational, "International Location"),
    // higher
    ("HBO", Sector::Higher, "Higher Professional Education"),
    ("WO", Sector::Higher, "University Education"),
    ("HBOS", Sector::Higher, "University of Applied Sciences"),
    ("UNIV", Sector::Higher, "Research University"),
    ("LOC", Sector::Higher, "Higher Education Branch"),
    ("ULOC", Sector::Higher, "University Branch"),
];

static TAXONOMY: Lazy<HashMap<&'static str, TypeCodeEntry>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|&(code, sector, facility_type)| (code, TypeCodeEntry { sector, facility_type }))
        .collect()
});

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn lookup(code: &str) -> Option<TypeCodeEntry> {
    TAXONOMY.get(normalize_code(code).as_str()).copied()
}

/// Sector for an organization type code, `None` when the code is not in the table.
pub fn sector_for_type_code(code: &str) -> Option<Sector> {
    lookup(code).map(|entry| entry.sector)
}

/// Facility label for an organization type code.
pub fn facility_type(code: Option<&str>) -> &'static str {
    code.and_then(lookup)
        .map(|entry| entry.facility_type)
        .unwrap_or(OTHER_FACILITY)
}

/// Sector for the program registry's own sector column (`PO`, `VO`, `MBO`, `HO`).
pub fn sector_for_registry_code(code: &str) -> Option<Sector> {
    match normalize_code(code).as_str() {
        "PO" => Some(Sector::Primary),
        "VO" => Some(Sector::Secondary),
        "MBO" | "BVE" => Some(Sector::Vocational),
        "HO" | "HBO" | "WO" => Some(Sector::Higher),
        _ => None,
    }
}

/// All type codes belonging to `sector`, in table order.
pub fn codes_for_sector(sector: Sector) -> Vec<&'static str> {
    ENTRIES
        .iter()
        .filter(|(_, s, _)| *s == sector)
        .map(|(code, _, _)| *code)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_lookup_is_case_and_whitespace_insensitive() {
        assert_eq!(sector_for_type_code("BAS"), Some(Sector::Primary));
        assert_eq!(sector_for_type_code(" bas "), Some(Sector::Primary));
        assert_eq!(sector_for_type_code("VOS"), Some(Sector::Secondary));
        assert_eq!(sector_for_type_code("ILOC"), Some(Sector::Vocational));
        assert_eq!(sector_for_type_code("UNIV"), Some(Sector::Higher));
        assert_eq!(sector_for_type_code("XYZ"), None);
    }

    #[test]
    fn test_facility_type_falls_back_to_other() {
        assert_eq!(facility_type(Some("SBAS")), "Special Primary Education");
        assert_eq!(facility_type(Some("nope")), OTHER_FACILITY);
        assert_eq!(facility_type(None), OTHER_FACILITY);
    }

    #[test]
    fn test_registry_sector_codes() {
        assert_eq!(sector_for_registry_code("PO"), Some(Sector::Primary));
        assert_eq!(sector_for_registry_code("vo"), Some(Sector::Secondary));
        assert_eq!(sector_for_registry_code("MBO"), Some(Sector::Vocational));
        assert_eq!(sector_for_registry_code("HO"), Some(Sector::Higher));
        assert_eq!(sector_for_registry_code(""), None);
    }

    #[test]
    fn test_every_code_maps_to_a_known_sector_once() {
        let mut seen = std::collections::HashSet::new();
        for (code, sector, _) in ENTRIES {
            assert!(sector.is_known());
            assert!(seen.insert(*code), "duplicate code {code}");
        }
        assert!(codes_for_sector(Sector::Unknown).is_empty());
        assert_eq!(codes_for_sector(Sector::Primary), vec!["BAS", "SBAS", "SPEC", "VST"]);
    }
}
