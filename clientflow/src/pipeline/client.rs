//! The client: pipeline configuration plus the pipeline that prepares
//! requests for transmission.

use super::{PipelineBuilder, RequestPipeline};
use crate::config::{ClientConfig, StageSettings};
use crate::errors::ClientflowError;
use crate::events::EventSink;
use crate::providers::{ProviderClass, ProviderInstance};
use crate::request::{ClientRequest, Method};
use crate::resolver::{ProviderServiceResolver, ServiceResolver};
use crate::stages::{EntitySerializationStage, FnStage, RequestStage, ScopeInitializationStage};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builder for `Client`.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    settings: StageSettings,
    resolver: Option<Arc<dyn ServiceResolver>>,
    events: Option<Arc<dyn EventSink>>,
    extra_stages: Vec<Arc<dyn RequestStage>>,
}

impl ClientBuilder {
    /// Creates a builder with an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider class for every request.
    #[must_use]
    pub fn with_class(mut self, class: ProviderClass) -> Self {
        self.config.register_class(class);
        self
    }

    /// Registers a provider instance for every request.
    #[must_use]
    pub fn with_instance(mut self, instance: ProviderInstance) -> Self {
        self.config.register_instance(instance);
        self
    }

    /// Sets a configuration property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.set_property(key, value);
        self
    }

    /// Replaces the whole pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the stage settings.
    #[must_use]
    pub fn with_settings(mut self, settings: StageSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Uses a custom service resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sends scope lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Appends a stage after the built-in ones.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// Appends a closure stage after the built-in ones.
    #[must_use]
    pub fn with_stage_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ClientRequest) -> Result<ClientRequest, ClientflowError> + Send + Sync + 'static,
    {
        self.with_stage(Arc::new(FnStage::new(name, func)))
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if two stages share a name.
    pub fn build(self) -> Result<Client, ClientflowError> {
        let config = Arc::new(self.config);
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ProviderServiceResolver::from_settings(&self.settings)));

        let mut scope_stage = ScopeInitializationStage::new(Arc::clone(&config), resolver)
            .with_settings(self.settings.clone());
        if let Some(sink) = self.events {
            scope_stage = scope_stage.with_event_sink(sink);
        }

        let mut builder = PipelineBuilder::new("client").stage(Arc::new(scope_stage))?;
        if self.settings.serialize_entities {
            builder.add_stage(Arc::new(EntitySerializationStage::new()))?;
        }
        for stage in self.extra_stages {
            builder.add_stage(stage)?;
        }

        Ok(Client {
            config,
            pipeline: Arc::new(builder.build()?),
        })
    }
}

/// Owns the pipeline configuration shared by all of its requests.
///
/// Cloning is cheap; clones share configuration and pipeline.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    pipeline: Arc<RequestPipeline>,
}

impl Client {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Creates a request whose configuration snapshot starts as the
    /// pipeline configuration.
    #[must_use]
    pub fn request(&self, method: Method, uri: impl Into<String>) -> ClientRequest {
        ClientRequest::new(method, uri).with_configuration(Arc::clone(&self.config))
    }

    /// Runs a request through the pipeline.
    pub async fn prepare(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        self.pipeline.run(request).await
    }

    /// Runs requests through the pipeline concurrently.
    ///
    /// Results are returned in input order; one failure does not affect the
    /// other requests.
    pub async fn prepare_all(
        &self,
        requests: Vec<ClientRequest>,
    ) -> Vec<Result<ClientRequest, ClientflowError>> {
        debug!(count = requests.len(), "Preparing requests");
        join_all(requests.into_iter().map(|r| self.prepare(r))).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("stages", &self.pipeline.stage_names())
            .finish()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("custom_resolver", &self.resolver.is_some())
            .field("extra_stages", &self.extra_stages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InvalidRequestError;
    use crate::testing::{JsonProvider, RecordingStage};

    #[test]
    fn test_default_stages() {
        let client = Client::builder().build().unwrap();
        assert_eq!(
            client.pipeline().stage_names(),
            vec!["scope_initialization", "entity_serialization"]
        );
    }

    #[test]
    fn test_serialization_can_be_disabled() {
        let client = Client::builder()
            .with_settings(StageSettings::new().with_serialize_entities(false))
            .with_stage(Arc::new(RecordingStage::new("recording")))
            .build()
            .unwrap();

        assert_eq!(
            client.pipeline().stage_names(),
            vec!["scope_initialization", "recording"]
        );
    }

    #[tokio::test]
    async fn test_closure_stage_runs_after_scope_initialization() {
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .with_stage_fn("tag_scope", |request: ClientRequest| {
                let scope_id = request
                    .scope()
                    .map(|scope| scope.id().to_string())
                    .ok_or_else(|| InvalidRequestError::scope_not_initialized(request.id()))?;
                Ok(request.with_header("x-scope-id", scope_id))
            })
            .build()
            .unwrap();

        let request = client
            .prepare(client.request(Method::Get, "https://example.test/"))
            .await
            .unwrap();

        assert_eq!(
            client.pipeline().stage_names(),
            vec!["scope_initialization", "entity_serialization", "tag_scope"]
        );
        let scope_id = request.scope().unwrap().id().to_string();
        assert_eq!(request.header("x-scope-id"), Some(scope_id.as_str()));
    }

    #[test]
    fn test_duplicate_stage_name_fails_build() {
        let err = Client::builder()
            .with_stage(Arc::new(RecordingStage::new("entity_serialization")))
            .build()
            .unwrap_err();

        assert!(matches!(err, ClientflowError::Validation(_)));
    }

    #[test]
    fn test_request_shares_pipeline_snapshot() {
        let client = Client::builder()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .build()
            .unwrap();

        let request = client.request(Method::Get, "https://example.test/");

        assert!(Arc::ptr_eq(request.configuration().unwrap(), client.config()));
    }
}
