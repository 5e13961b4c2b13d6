// Infrastructure adapters behind application ports

pub mod google_geocoder;

pub use google_geocoder::GoogleGeocoder;
