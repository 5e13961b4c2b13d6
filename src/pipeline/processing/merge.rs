use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{
    EducationRecord, MergedLocation, OrganizationRecord, RelationRecord, Sector, TemporalStatus,
    IDENTIFIER_SEPARATOR,
};
use crate::pipeline::processing::normalize::{standardize_address, AddressParts};
use crate::taxonomy;

/// How a record's sector was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorSource {
    TypeCode,
    Programs,
    Parent,
    Unresolved,
}

/// Counts reported at the end of a merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub rows_read: usize,
    pub dropped_missing_identifier: usize,
    pub dropped_missing_address: usize,
    pub malformed_dates: usize,
    /// Registry rows the reader could not decode
    pub unreadable_rows: usize,
    /// Program or relation rows without the identifiers to link them
    pub unlinked_rows: usize,
    pub unknown_sector: usize,
    pub sector_from_programs: usize,
    pub sector_from_parent: usize,
    pub start_from_programs: usize,
    /// Rows absorbed into another row at the same (address, sector)
    pub collapsed_rows: usize,
    pub locations_per_sector: BTreeMap<Sector, usize>,
}

impl MergeReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped_missing_identifier + self.dropped_missing_address
    }

    pub fn locations_written(&self) -> usize {
        self.locations_per_sector.values().sum()
    }
}

/// Side information from the program and relation registries used when an
/// organization's own type code is not in the taxonomy.
#[derive(Debug, Default)]
pub struct SectorResolver {
    program_sector: HashMap<String, Sector>,
    program_start: HashMap<String, NaiveDate>,
    parents: HashMap<String, Vec<String>>,
    type_codes: HashMap<String, String>,
}

impl SectorResolver {
    pub fn new(
        organizations: &[OrganizationRecord],
        education: &[EducationRecord],
        relations: &[RelationRecord],
    ) -> Self {
        let mut votes: HashMap<&str, BTreeMap<Sector, usize>> = HashMap::new();
        let mut program_start: HashMap<String, NaiveDate> = HashMap::new();
        for program in education {
            if let Some(sector) = program.sector {
                *votes
                    .entry(program.identifier.as_str())
                    .or_default()
                    .entry(sector)
                    .or_default() += 1;
            }
            if let Some(start) = program.start_date {
                program_start
                    .entry(program.identifier.clone())
                    .and_modify(|current| *current = (*current).min(start))
                    .or_insert(start);
            }
        }

        // Majority sector per organization; BTreeMap order breaks ties toward
        // the earlier sector.
        let program_sector = votes
            .into_iter()
            .filter_map(|(id, counts)| {
                let max = counts.values().copied().max()?;
                counts
                    .into_iter()
                    .find(|(_, count)| *count == max)
                    .map(|(sector, _)| (id.to_string(), sector))
            })
            .collect();

        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for relation in relations {
            parents
                .entry(relation.child.clone())
                .or_default()
                .push(relation.parent.clone());
        }

        let type_codes = organizations
            .iter()
            .filter_map(|org| Some((org.identifier.clone()?, org.type_code.clone()?)))
            .collect();

        Self {
            program_sector,
            program_start,
            parents,
            type_codes,
        }
    }

    pub fn resolve(&self, org: &OrganizationRecord) -> (Sector, SectorSource) {
        if let Some(sector) = org.type_code.as_deref().and_then(taxonomy::sector_for_type_code) {
            return (sector, SectorSource::TypeCode);
        }

        let Some(id) = org.identifier.as_deref() else {
            return (Sector::Unknown, SectorSource::Unresolved);
        };

        if let Some(sector) = self.program_sector.get(id) {
            return (*sector, SectorSource::Programs);
        }

        let parent_sector = self.parents.get(id).and_then(|parents| {
            parents
                .iter()
                .filter_map(|parent| self.type_codes.get(parent))
                .find_map(|code| taxonomy::sector_for_type_code(code))
        });
        match parent_sector {
            Some(sector) => (sector, SectorSource::Parent),
            None => (Sector::Unknown, SectorSource::Unresolved),
        }
    }

    pub fn earliest_program_start(&self, id: &str) -> Option<NaiveDate> {
        self.program_start.get(id).copied()
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Merge the organization registry into one deduplicated table per sector.
///
/// Rows without an identifier, or without both street and postal code, are
/// dropped and counted. Every other row lands in exactly one sector table,
/// `Sector::Unknown` included.
pub fn merge_locations(
    organizations: &[OrganizationRecord],
    education: &[EducationRecord],
    relations: &[RelationRecord],
) -> (BTreeMap<Sector, Vec<MergedLocation>>, MergeReport) {
    let resolver = SectorResolver::new(organizations, education, relations);
    let mut report = MergeReport {
        rows_read: organizations.len(),
        ..Default::default()
    };

    let mut candidates = Vec::with_capacity(organizations.len());
    for org in organizations {
        let Some(identifier) = org.identifier.as_deref().map(str::trim).filter(|s| !s.is_empty())
        else {
            report.dropped_missing_identifier += 1;
            continue;
        };
        if !has_text(&org.street) && !has_text(&org.postal_code) {
            report.dropped_missing_address += 1;
            continue;
        }

        let (sector, source) = resolver.resolve(org);
        match source {
            SectorSource::Programs => report.sector_from_programs += 1,
            SectorSource::Parent => report.sector_from_parent += 1,
            SectorSource::Unresolved => report.unknown_sector += 1,
            SectorSource::TypeCode => {}
        }

        let start_date = match org.start_date {
            Some(start) => Some(start),
            None => {
                let fallback = resolver.earliest_program_start(identifier);
                if fallback.is_some() {
                    report.start_from_programs += 1;
                }
                fallback
            }
        };

        candidates.push(MergedLocation {
            identifiers: identifier.to_string(),
            name: org.name.clone(),
            function_code: org.function_code.clone(),
            location_type: org.type_code.clone(),
            sector,
            temporal_status: TemporalStatus::from_end_date(org.end_date),
            full_address: standardize_address(&AddressParts {
                street: org.street.as_deref(),
                house_number: org.house_number.as_deref(),
                house_number_addition: org.house_number_addition.as_deref(),
                postal_code: org.postal_code.as_deref(),
                city: org.city.as_deref(),
            }),
            postal_code: org.postal_code.clone(),
            city: org.city.clone(),
            province: org.province.clone(),
            start_date,
            end_date: org.end_date,
        });
    }

    let candidate_count = candidates.len();
    let merged = deduplicate(candidates);
    report.collapsed_rows = candidate_count - merged.len();

    let mut by_sector: BTreeMap<Sector, Vec<MergedLocation>> = BTreeMap::new();
    for location in merged {
        by_sector.entry(location.sector).or_default().push(location);
    }
    report.locations_per_sector = by_sector.iter().map(|(s, rows)| (*s, rows.len())).collect();

    (by_sector, report)
}

/// Collapse rows sharing (full_address, sector) into one, keeping the union
/// of their occupancy: earliest start, latest end with an open end winning.
/// Output is ordered by sector then address. Idempotent: feeding the output
/// back in, alone or concatenated with itself, returns the same rows.
pub fn deduplicate(rows: Vec<MergedLocation>) -> Vec<MergedLocation> {
    let mut groups: BTreeMap<(Sector, String), MergedLocation> = BTreeMap::new();
    for row in rows {
        let key = (row.sector, row.full_address.clone());
        match groups.get_mut(&key) {
            Some(existing) => absorb(existing, row),
            None => {
                let mut row = row;
                row.identifiers = join_identifiers(split_identifiers(&row.identifiers));
                row.temporal_status = TemporalStatus::from_end_date(row.end_date);
                groups.insert(key, row);
            }
        }
    }
    groups.into_values().collect()
}

fn split_identifiers(joined: &str) -> BTreeSet<String> {
    joined
        .split(IDENTIFIER_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_identifiers(ids: BTreeSet<String>) -> String {
    ids.into_iter()
        .collect::<Vec<_>>()
        .join(&IDENTIFIER_SEPARATOR.to_string())
}

/// Known start dates sort before unknown ones.
fn starts_earlier(candidate: Option<NaiveDate>, current: Option<NaiveDate>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a.cmp(&b) == Ordering::Less,
        (Some(_), None) => true,
        _ => false,
    }
}

fn absorb(target: &mut MergedLocation, other: MergedLocation) {
    let mut ids = split_identifiers(&target.identifiers);
    ids.extend(split_identifiers(&other.identifiers));
    target.identifiers = join_identifiers(ids);

    // Descriptive fields follow the row that opened first
    if starts_earlier(other.start_date, target.start_date) {
        target.name = other.name;
        target.function_code = other.function_code;
        target.location_type = other.location_type;
        target.postal_code = other.postal_code;
        target.city = other.city;
        target.province = other.province;
    }

    target.start_date = match (target.start_date, other.start_date) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    // Null end means still open, which wins over any closing date
    target.end_date = match (target.end_date, other.end_date) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    };
    target.temporal_status = TemporalStatus::from_end_date(target.end_date);
}
