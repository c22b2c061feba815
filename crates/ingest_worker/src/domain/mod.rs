mod location_ingest_service;

pub use location_ingest_service::*;
