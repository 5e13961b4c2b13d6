//! Address standardization and date coercion for raw registry cells.

pub mod address;
pub mod dates;

pub use address::{geocode_query, standardize_address, standardize_free_text, AddressParts};
pub use dates::{parse_date_cell, DateCell, DateCoercion};
