//! Error types for the clientflow request pipeline.
//!
//! Setup-phase failures (invalid requests, service materialization, scope
//! conflicts) are kept distinct from entity and pipeline-definition errors so
//! that callers can tell a request that never left the client apart from a
//! transport or server failure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for clientflow operations.
#[derive(Debug, Error)]
pub enum ClientflowError {
    /// The request cannot be processed as submitted.
    #[error("{0}")]
    InvalidRequest(#[from] InvalidRequestError),

    /// A request-scoped service could not be materialized.
    #[error("{0}")]
    ServiceMaterialization(#[from] ServiceMaterializationError),

    /// A scope slot was written twice.
    #[error("{0}")]
    ScopeConflict(#[from] ScopeConflictError),

    /// Entity serialization or deserialization failed.
    #[error("{0}")]
    Entity(#[from] EntityError),

    /// The pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The exchange was cancelled before the stage completed.
    #[error("Exchange cancelled: {0}")]
    Cancelled(String),

    /// Stage settings could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientflowError {
    /// Returns true for failures raised while setting up the request scope.
    ///
    /// These never reach the network.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::ServiceMaterialization(_) | Self::ScopeConflict(_)
        )
    }

    /// Returns a stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "SETUP-001-INVALID_REQUEST",
            Self::ServiceMaterialization(_) => "SETUP-002-MATERIALIZATION",
            Self::ScopeConflict(_) => "SETUP-003-SCOPE_CONFLICT",
            Self::Entity(_) => "ENTITY-001",
            Self::Validation(_) => "PIPELINE-001-VALIDATION",
            Self::Cancelled(_) => "EXCHANGE-001-CANCELLED",
            Self::Configuration(_) => "CONFIG-001",
        }
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("setup_error".to_string(), serde_json::json!(self.is_setup_error()));

        if let Self::ServiceMaterialization(err) = self {
            map.insert("service".to_string(), serde_json::json!(err.service.as_str()));
        }
        if let Self::InvalidRequest(err) = self {
            map.insert("request_id".to_string(), serde_json::json!(err.request_id.to_string()));
        }

        map
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRequestReason {
    /// The request carries no configuration snapshot.
    MissingConfiguration,
    /// The request has already been bound to a scope.
    AlreadyScoped,
    /// A downstream stage ran before the scope was initialized.
    ScopeNotInitialized,
}

impl InvalidRequestReason {
    /// Returns the reason as a message fragment.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingConfiguration => "request has no configuration snapshot",
            Self::AlreadyScoped => "request is already bound to a scope",
            Self::ScopeNotInitialized => "request scope has not been initialized",
        }
    }
}

/// Error raised when an incoming request lacks what the pipeline requires.
#[derive(Debug, Clone, Error)]
#[error("Invalid request {request_id}: {}", .reason.as_str())]
pub struct InvalidRequestError {
    /// The rejected request.
    pub request_id: Uuid,
    /// The rejection reason.
    pub reason: InvalidRequestReason,
}

impl InvalidRequestError {
    /// Creates a new invalid request error.
    #[must_use]
    pub fn new(request_id: Uuid, reason: InvalidRequestReason) -> Self {
        Self { request_id, reason }
    }

    /// The request has no configuration snapshot.
    #[must_use]
    pub fn missing_configuration(request_id: Uuid) -> Self {
        Self::new(request_id, InvalidRequestReason::MissingConfiguration)
    }

    /// The request already went through scope initialization.
    #[must_use]
    pub fn already_scoped(request_id: Uuid) -> Self {
        Self::new(request_id, InvalidRequestReason::AlreadyScoped)
    }

    /// A stage needed scope services that were never attached.
    #[must_use]
    pub fn scope_not_initialized(request_id: Uuid) -> Self {
        Self::new(request_id, InvalidRequestReason::ScopeNotInitialized)
    }
}

/// The request-scoped services the pipeline materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Exception-mapping service.
    ExceptionMappers,
    /// Message-body (serialization) service.
    MessageBodyWorkers,
    /// Context-resolution service.
    ContextResolvers,
}

impl ServiceKind {
    /// All service kinds, in publication order.
    pub const ALL: [Self; 3] = [
        Self::ExceptionMappers,
        Self::MessageBodyWorkers,
        Self::ContextResolvers,
    ];

    /// Returns the snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExceptionMappers => "exception_mappers",
            Self::MessageBodyWorkers => "message_body_workers",
            Self::ContextResolvers => "context_resolvers",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a resolver cannot produce a request-scoped service.
#[derive(Debug, Clone, Error)]
#[error("Failed to materialize {service} for scope {scope_id}: {message}")]
pub struct ServiceMaterializationError {
    /// The service that failed.
    pub service: ServiceKind,
    /// The scope it was being materialized for.
    pub scope_id: Uuid,
    /// What went wrong.
    pub message: String,
}

impl ServiceMaterializationError {
    /// Creates a new materialization error.
    #[must_use]
    pub fn new(service: ServiceKind, scope_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            service,
            scope_id,
            message: message.into(),
        }
    }

    /// Wraps a provider failure, keeping its full cause chain in the message.
    #[must_use]
    pub fn from_provider(service: ServiceKind, scope_id: Uuid, err: &anyhow::Error) -> Self {
        Self::new(service, scope_id, format!("{err:#}"))
    }
}

/// Error raised when writing a scope slot that is already set.
#[derive(Debug, Clone, Error)]
#[error("Scope conflict: slot '{slot}' of scope {scope_id} is already set")]
pub struct ScopeConflictError {
    /// The scope.
    pub scope_id: Uuid,
    /// The slot name.
    pub slot: String,
}

impl ScopeConflictError {
    /// Creates a new scope conflict error.
    #[must_use]
    pub fn new(scope_id: Uuid, slot: impl Into<String>) -> Self {
        Self {
            scope_id,
            slot: slot.into(),
        }
    }
}

/// Errors raised by message-body workers.
#[derive(Debug, Error)]
pub enum EntityError {
    /// No registered writer accepts the media type.
    #[error("No message body writer for media type '{media_type}'")]
    NoWriter {
        /// The requested media type.
        media_type: String,
    },

    /// No registered reader accepts the media type.
    #[error("No message body reader for media type '{media_type}'")]
    NoReader {
        /// The requested media type.
        media_type: String,
    },

    /// The media type string could not be parsed.
    #[error("Invalid media type '{0}'")]
    InvalidMediaType(String),

    /// A provider failed while reading or writing.
    #[error("Provider '{provider}' failed: {message}")]
    Provider {
        /// The provider identity.
        provider: String,
        /// The failure message.
        message: String,
    },
}

/// Error raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}
