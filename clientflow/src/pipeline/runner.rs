//! Sequential request pipeline.

use crate::errors::ClientflowError;
use crate::request::ClientRequest;
use crate::stages::RequestStage;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// An ordered sequence of request stages.
///
/// A pipeline is immutable once built and can run any number of requests
/// concurrently.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    name: String,
    stages: Vec<Arc<dyn RequestStage>>,
}

impl RequestPipeline {
    pub(crate) fn new(name: String, stages: Vec<Arc<dyn RequestStage>>) -> Self {
        Self { name, stages }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs `request` through every stage in order.
    ///
    /// Stops at the first failing stage. A request cancelled between stages
    /// fails with `ClientflowError::Cancelled`.
    pub async fn run(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        let span = info_span!("pipeline", pipeline = %self.name, request_id = %request.id());
        self.run_stages(request).instrument(span).await
    }

    async fn run_stages(&self, mut request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        for stage in &self.stages {
            request.cancellation().check()?;
            debug!(stage = stage.name(), "Running stage");
            request = stage.process(request).await.map_err(|err| {
                warn!(stage = stage.name(), code = err.code(), error = %err, "Stage failed");
                err
            })?;
        }
        Ok(request)
    }
}
