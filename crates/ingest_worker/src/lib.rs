pub mod batch;
pub mod config;
pub mod domain;
pub mod ingest_worker;
pub mod mqtt;

pub use batch::*;
pub use config::*;
pub use domain::*;
pub use ingest_worker::*;
pub use mqtt::*;

#[cfg(test)]
pub(crate) mod test_support;
