//! Request pipelines and the client that drives them.
//!
//! This module provides:
//! - `PipelineBuilder` with validation
//! - `RequestPipeline`, an ordered sequence of request stages
//! - `Client`, which owns the pipeline configuration and prepares requests

mod builder;
mod client;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use client::{Client, ClientBuilder};
pub use runner::RequestPipeline;
