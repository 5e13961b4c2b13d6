// Pipeline ingestion: raw registry tables and their typed records

pub mod raw_table;
pub mod registries;

pub use registries::{load_education, load_organizations, load_relations, LoadedTable};
