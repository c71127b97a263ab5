//! Request stages.
//!
//! A stage transforms one outbound request and hands it to the next stage.
//! Stages are shared by every request a pipeline prepares, so they keep no
//! per-request state.

mod entity;
mod scope_init;

pub use entity::EntitySerializationStage;
pub use scope_init::ScopeInitializationStage;

use crate::errors::ClientflowError;
use crate::request::ClientRequest;
use async_trait::async_trait;
use std::fmt::Debug;

/// A step of a request pipeline.
#[async_trait]
pub trait RequestStage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Processes the request, returning it for the next stage.
    async fn process(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError>;
}

/// A stage backed by a closure.
///
/// Registered on a client through `ClientBuilder::with_stage_fn`.
pub struct FnStage<F>
where
    F: Fn(ClientRequest) -> Result<ClientRequest, ClientflowError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(ClientRequest) -> Result<ClientRequest, ClientflowError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(ClientRequest) -> Result<ClientRequest, ClientflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> RequestStage for FnStage<F>
where
    F: Fn(ClientRequest) -> Result<ClientRequest, ClientflowError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        (self.func)(request)
    }
}
