pub mod client;
pub mod config;
pub mod latest_location_repository;

pub use client::*;
pub use config::*;
pub use latest_location_repository::*;
