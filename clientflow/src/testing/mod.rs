//! Testing utilities for clientflow pipelines.
//!
//! This module provides:
//! - Provider fixtures for each provider contract
//! - A fault-injecting resolver and mock stages
//! - Scope assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_scope_initialized, assert_scope_unpublished};
pub use fixtures::{
    ClosingProvider, FailingFactoryProvider, JsonProvider, PlainTextWriter, StaticContextResolver,
    StatusMapper,
};
pub use mocks::{FailingStage, FaultInjectingResolver, RecordedRequest, RecordingStage, SlowStage};
