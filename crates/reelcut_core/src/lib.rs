pub mod config;
pub mod error;
pub mod estimate;
pub mod filters;
pub mod registry;
pub mod types;
