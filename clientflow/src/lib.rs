//! # Clientflow
//!
//! Request-scope initialization for client-side HTTP request pipelines.
//!
//! Before a request is transmitted, clientflow opens a fresh scope for it,
//! merges the client's provider registrations with the request's own, and
//! publishes the request-scoped services later stages rely on:
//!
//! - **Exception mappers**: translate failures into caller-facing errors
//! - **Message-body workers**: serialize and deserialize entities
//! - **Context resolvers**: supply contextual objects per media type
//!
//! Scopes are isolated per request, published all-or-nothing, and released
//! when the exchange ends.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clientflow::prelude::*;
//!
//! let client = Client::builder()
//!     .with_class(ProviderClass::of::<JsonWriter>("json"))
//!     .build()?;
//!
//! let request = client
//!     .request(Method::Post, "https://api.example.com/orders")
//!     .with_entity(serde_json::json!({"sku": "A-1"}), MediaType::application_json());
//!
//! let prepared = client.prepare(request).await?;
//! assert!(prepared.scope().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod request;
pub mod resolver;
pub mod scope;
pub mod services;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ClientConfig, StageSettings};
    pub use crate::errors::{
        ClientflowError, EntityError, InvalidRequestError, PipelineValidationError,
        ScopeConflictError, ServiceKind, ServiceMaterializationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Client, ClientBuilder, PipelineBuilder, RequestPipeline};
    pub use crate::providers::{
        Provider, ProviderBinder, ProviderClass, ProviderContract, ProviderId, ProviderInstance,
        ProviderSink,
    };
    pub use crate::request::{ClientRequest, Method, RequestContext};
    pub use crate::resolver::{ProviderServiceResolver, ServiceResolver};
    pub use crate::scope::{RequestScope, ScopeServices, ScopeSlot, ScopeState};
    pub use crate::services::{
        ContextResolver, ContextResolvers, ExceptionMapper, ExceptionMappers, MappedError,
        MediaType, MessageBodyReader, MessageBodyWorkers, MessageBodyWriter,
    };
    pub use crate::stages::{
        EntitySerializationStage, RequestStage, ScopeInitializationStage,
    };
}
