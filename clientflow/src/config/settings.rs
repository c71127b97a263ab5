//! Settings for the scope initialization stage.

use crate::errors::ClientflowError;
use crate::providers::ProviderContract;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning for scope initialization and the default pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Whether to emit `scope.*` events to the event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
    /// Contracts that must have at least one provider in every scope.
    #[serde(default)]
    pub required_contracts: Vec<ProviderContract>,
    /// Whether the client pipeline serializes request entities.
    #[serde(default = "default_serialize_entities")]
    pub serialize_entities: bool,
}

fn default_emit_events() -> bool {
    true
}

fn default_serialize_entities() -> bool {
    true
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            emit_events: default_emit_events(),
            required_contracts: Vec::new(),
            serialize_entities: default_serialize_entities(),
        }
    }
}

impl StageSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a contract to be provided in every scope.
    #[must_use]
    pub fn with_required_contract(mut self, contract: ProviderContract) -> Self {
        if !self.required_contracts.contains(&contract) {
            self.required_contracts.push(contract);
        }
        self
    }

    /// Enables or disables event emission.
    #[must_use]
    pub fn with_emit_events(mut self, emit: bool) -> Self {
        self.emit_events = emit;
        self
    }

    /// Enables or disables entity serialization in the client pipeline.
    #[must_use]
    pub fn with_serialize_entities(mut self, serialize: bool) -> Self {
        self.serialize_entities = serialize;
        self
    }

    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ClientflowError> {
        serde_json::from_str(json)
            .map_err(|e| ClientflowError::Configuration(format!("invalid stage settings: {e}")))
    }

    /// Loads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientflowError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}
