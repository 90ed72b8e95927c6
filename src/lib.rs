pub mod analytics;
pub mod config;
pub mod ingest;
pub mod models;
pub mod output;
