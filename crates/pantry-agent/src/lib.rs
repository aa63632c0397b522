pub mod agent;
pub mod config;
pub mod errors;
pub mod executor;
pub mod extractor;
pub mod i18n;
pub mod models;
pub mod providers;
pub mod schema;
pub mod store;
pub mod telemetry;
