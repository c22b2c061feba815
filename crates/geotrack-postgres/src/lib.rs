pub mod client;
pub mod config;
pub mod location_history_repository;
pub mod models;

pub use client::*;
pub use config::*;
pub use location_history_repository::*;
pub use models::*;
