pub mod error;
pub mod location_query_service;
pub mod repository;
pub mod types;

pub use error::*;
pub use location_query_service::*;
pub use repository::*;
pub use types::*;
