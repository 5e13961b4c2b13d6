use chrono::{NaiveDate, NaiveDateTime};

/// Outcome of coercing a registry date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCell {
    Empty,
    Valid(NaiveDate),
    Malformed,
}

// DUO exports use day-first dates; intermediate files use ISO.
const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d-%m-%Y %H:%M:%S"];

pub fn parse_date_cell(raw: Option<&str>) -> DateCell {
    let value = match raw.map(str::trim) {
        None | Some("") => return DateCell::Empty,
        Some(v) if v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("nat") => {
            return DateCell::Empty
        }
        Some(v) => v,
    };

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return DateCell::Valid(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return DateCell::Valid(datetime.date());
        }
    }
    DateCell::Malformed
}

/// Counts malformed cells coerced to null while loading a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateCoercion {
    pub malformed: usize,
}

impl DateCoercion {
    /// Parse a cell, nulling and counting it when malformed.
    pub fn coerce(&mut self, raw: Option<&str>) -> Option<NaiveDate> {
        match parse_date_cell(raw) {
            DateCell::Valid(date) => Some(date),
            DateCell::Empty => None,
            DateCell::Malformed => {
                self.malformed += 1;
                None
            }
        }
    }
}
