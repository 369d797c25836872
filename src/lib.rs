//! # healthtrack
//!
//! Startup configuration for the healthtrack backend: layered loading of
//! defaults, a YAML/JSON file and environment variables into a validated
//! [`config::AppConfig`], plus the telemetry setup that depends on it.

pub mod config;
pub mod telemetry;
