// Data processing pipeline: ingestion, processing, geocoding and storage

pub mod geocoding;
pub mod ingestion;
pub mod processing;
pub mod storage;
