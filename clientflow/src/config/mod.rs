//! Client configuration and stage settings.
//!
//! This module provides:
//! - `ClientConfig`, the provider/property snapshot shared by a client and
//!   copied into each request
//! - `StageSettings`, serde-loadable tuning for the scope initialization stage

mod client_config;
mod settings;

pub use client_config::ClientConfig;
pub use settings::StageSettings;
