//! HTTP API: configuration, demo data, routing, and request/response mapping.

pub mod app;
pub mod config;
pub mod seed;

pub use config::{ApiConfig, ConfigError};
