use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::domain::{
    GeocodeResult, JoinStatus, MergedLocation, RefinedLocation, TemporalStatus, YearsOfOperation,
};
use crate::pipeline::processing::normalize::standardize_free_text;
use crate::taxonomy;

/// Whole years between `start` and `end`; `Ongoing` when the location never
/// closed. A partial final year does not count.
pub fn years_of_operation(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Option<YearsOfOperation> {
    let start = start?;
    let Some(end) = end else {
        return Some(YearsOfOperation::Ongoing);
    };
    if end < start {
        return Some(YearsOfOperation::Years(0));
    }
    let mut years = end.year() - start.year();
    if (end.month(), end.day()) < (start.month(), start.day()) {
        years -= 1;
    }
    Some(YearsOfOperation::Years(years.max(0) as u32))
}

/// Decade bucket: 1987 -> 1980.
pub fn decade(date: Option<NaiveDate>) -> Option<i32> {
    date.map(|d| d.year().div_euclid(10) * 10)
}

pub fn operation_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    let start = start?;
    let end = match end {
        Some(end) => end.format("%Y-%m-%d").to_string(),
        None => "present".to_string(),
    };
    Some(format!("{} to {}", start.format("%Y-%m-%d"), end))
}

/// Attach coordinates and derived attributes to one merged location.
/// `geocode` is the row for the same `full_address`, if any.
pub fn refine_location(location: &MergedLocation, geocode: Option<&GeocodeResult>) -> RefinedLocation {
    let (latitude, longitude, geocode_status, geocode_quality) = match geocode {
        Some(hit) => (
            hit.latitude,
            hit.longitude,
            JoinStatus::from(hit.status),
            hit.quality.clone(),
        ),
        None => (None, None, JoinStatus::Ungeocoded, None),
    };

    RefinedLocation {
        identifiers: location.identifiers.clone(),
        name: location.name.clone(),
        function_code: location.function_code.clone(),
        location_type: location.location_type.clone(),
        sector: location.sector,
        full_address: location.full_address.clone(),
        postal_code: location.postal_code.clone(),
        city: location.city.clone(),
        province: location.province.clone(),
        start_date: location.start_date,
        end_date: location.end_date,
        latitude,
        longitude,
        geocode_status,
        geocode_quality,
        location_status: TemporalStatus::from_end_date(location.end_date),
        facility_type: taxonomy::facility_type(location.location_type.as_deref()),
        years_of_operation: years_of_operation(location.start_date, location.end_date),
        decade_opened: decade(location.start_date),
        decade_closed: decade(location.end_date),
        operation_period: operation_period(location.start_date, location.end_date),
    }
}

/// Left-join merged locations against the geocode table. Every merged row
/// produces exactly one refined row. Addresses match exactly first, then
/// after re-standardizing both sides, so hand-edited tables still join.
pub fn refine_all(
    locations: &[MergedLocation],
    geocodes: &HashMap<String, GeocodeResult>,
) -> Vec<RefinedLocation> {
    let standardized: HashMap<String, &GeocodeResult> = geocodes
        .values()
        .map(|result| (standardize_free_text(&result.full_address), result))
        .collect();

    locations
        .iter()
        .map(|location| {
            let geocode = geocodes.get(&location.full_address).or_else(|| {
                standardized
                    .get(&standardize_free_text(&location.full_address))
                    .copied()
            });
            refine_location(location, geocode)
        })
        .collect()
}

/// Summary statistics logged after refining one sector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefineSummary {
    pub total: usize,
    pub with_coordinates: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_join_status: BTreeMap<&'static str, usize>,
    pub by_facility_type: BTreeMap<&'static str, usize>,
    pub opened_per_decade: BTreeMap<i32, usize>,
    pub average_closed_years: Option<f64>,
}

impl RefineSummary {
    pub fn from_rows(rows: &[RefinedLocation]) -> Self {
        let mut summary = RefineSummary {
            total: rows.len(),
            ..Default::default()
        };
        let mut closed_years = Vec::new();

        for row in rows {
            if row.latitude.is_some() && row.longitude.is_some() {
                summary.with_coordinates += 1;
            }
            match row.location_status {
                TemporalStatus::Active => summary.active += 1,
                TemporalStatus::Inactive => summary.inactive += 1,
            }
            *summary
                .by_join_status
                .entry(join_status_label(row.geocode_status))
                .or_default() += 1;
            *summary.by_facility_type.entry(row.facility_type).or_default() += 1;
            if let Some(decade) = row.decade_opened {
                *summary.opened_per_decade.entry(decade).or_default() += 1;
            }
            if let Some(YearsOfOperation::Years(years)) = row.years_of_operation {
                closed_years.push(years as f64);
            }
        }

        if !closed_years.is_empty() {
            summary.average_closed_years =
                Some(closed_years.iter().sum::<f64>() / closed_years.len() as f64);
        }
        summary
    }

    /// Share of rows with coordinates, as a percentage.
    pub fn coverage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.with_coordinates as f64 * 100.0 / self.total as f64
        }
    }
}

fn join_status_label(status: JoinStatus) -> &'static str {
    match status {
        JoinStatus::Ok => "ok",
        JoinStatus::NotFound => "not_found",
        JoinStatus::Error => "error",
        JoinStatus::Ungeocoded => "ungeocoded",
    }
}
