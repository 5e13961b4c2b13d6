// Pipeline storage: per-sector CSV tables exchanged between stages

pub mod tables;

pub use tables::{read_merged_locations, write_merged_locations, write_table, MergedTable};
