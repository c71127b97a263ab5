//! Request-scope initialization.

use super::RequestStage;
use crate::config::{ClientConfig, StageSettings};
use crate::errors::{ClientflowError, InvalidRequestError};
use crate::events::{get_event_sink, EventSink, SCOPE_FAILED, SCOPE_INITIALIZED};
use crate::observability::SpanTimer;
use crate::providers::{ProviderBinder, ProviderSet, ProviderSink};
use crate::request::{ClientRequest, RequestContext};
use crate::resolver::{ProviderServiceResolver, ServiceResolver};
use crate::scope::{RequestScope, ScopeServices};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};
use uuid::Uuid;

/// Opens the request scope and publishes the request-scoped services.
///
/// For every request it:
/// 1. creates a fresh `RequestScope` over the pipeline-wide providers;
/// 2. registers the request's provider classes, then its instances;
/// 3. materializes exception mappers, message-body workers and context
///    resolvers for that scope;
/// 4. publishes configuration, the three services and the request context
///    into the scope in one step;
/// 5. attaches the message-body workers and the scope to the request.
///
/// Any failure leaves the request untouched and the scope unpublished, and
/// releases whatever the scope acquired. The stage holds no per-request
/// state and may serve any number of requests concurrently.
pub struct ScopeInitializationStage {
    pipeline_config: Arc<ClientConfig>,
    bindings: Arc<ProviderSet>,
    resolver: Arc<dyn ServiceResolver>,
    sink: Arc<dyn ProviderSink>,
    settings: StageSettings,
    events: Option<Arc<dyn EventSink>>,
}

impl ScopeInitializationStage {
    /// Stage name.
    pub const NAME: &'static str = "scope_initialization";

    /// Creates a stage over the pipeline configuration.
    #[must_use]
    pub fn new(pipeline_config: Arc<ClientConfig>, resolver: Arc<dyn ServiceResolver>) -> Self {
        let bindings = Arc::new(ProviderSet::from_config(&pipeline_config));
        Self {
            pipeline_config,
            bindings,
            resolver,
            sink: Arc::new(ProviderBinder::new()),
            settings: StageSettings::default(),
            events: None,
        }
    }

    /// Creates a stage using `ProviderServiceResolver` built from `settings`.
    #[must_use]
    pub fn with_defaults(pipeline_config: Arc<ClientConfig>, settings: StageSettings) -> Self {
        let resolver = Arc::new(ProviderServiceResolver::from_settings(&settings));
        Self::new(pipeline_config, resolver).with_settings(settings)
    }

    /// Replaces the provider-registration sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProviderSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: StageSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Emits lifecycle events to `sink` instead of the global sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn pipeline_config(&self) -> &Arc<ClientConfig> {
        &self.pipeline_config
    }

    /// Returns the pipeline-wide provider bindings.
    #[must_use]
    pub fn bindings(&self) -> &Arc<ProviderSet> {
        &self.bindings
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Initializes the scope of `request` in place.
    ///
    /// On error the request is left exactly as it was passed in.
    pub fn initialize(&self, request: &mut ClientRequest) -> Result<(), ClientflowError> {
        let span = debug_span!("scope_init", request_id = %request.id());
        let _entered = span.enter();
        let timer = SpanTimer::start(Self::NAME);

        match self.open_scope(request) {
            Ok(scope) => {
                let duration_ms = timer.finish();
                debug!(scope_id = %scope.id(), duration_ms, "Request scope initialized");
                self.emit(
                    SCOPE_INITIALIZED,
                    serde_json::json!({
                        "request_id": request.id().to_string(),
                        "scope_id": scope.id().to_string(),
                        "request_bindings": scope.resolution().request_binding_count(),
                        "owned_instances": scope.resolution().owned_instance_count(),
                        "duration_ms": duration_ms,
                    }),
                );
                Ok(())
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Request scope initialization failed");
                let mut payload = err.to_dict();
                payload.insert(
                    "request_id".to_string(),
                    serde_json::json!(request.id().to_string()),
                );
                payload.insert("duration_ms".to_string(), serde_json::json!(timer.finish()));
                self.emit(SCOPE_FAILED, serde_json::json!(payload));
                Err(err)
            }
        }
    }

    fn open_scope(&self, request: &mut ClientRequest) -> Result<RequestScope, ClientflowError> {
        let request_id = request.id();
        if request.scope().is_some() {
            return Err(InvalidRequestError::already_scoped(request_id).into());
        }
        let configuration = request
            .configuration()
            .cloned()
            .ok_or_else(|| InvalidRequestError::missing_configuration(request_id))?;
        request.cancellation().check()?;

        let scope = RequestScope::new(Arc::clone(&self.bindings));
        let guard = ReleaseOnFailure::new(&scope, request_id);

        let resolution = scope.resolution();
        self.sink
            .register_classes(resolution, configuration.provider_classes());
        self.sink
            .register_instances(resolution, configuration.provider_instances());

        let exception_mappers = self.resolver.materialize_exception_mappers(&scope)?;
        let message_body_workers = self.resolver.materialize_message_body_workers(&scope)?;
        let context_resolvers = self.resolver.materialize_context_resolvers(&scope)?;

        request.cancellation().check()?;

        scope.publish(ScopeServices {
            configuration,
            exception_mappers,
            message_body_workers: Arc::clone(&message_body_workers),
            context_resolvers,
            request_context: RequestContext::capture(request),
        })?;
        guard.disarm();

        request.attach_scope(scope.clone(), message_body_workers);
        Ok(scope)
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if !self.settings.emit_events {
            return;
        }
        let sink = self.events.clone().unwrap_or_else(get_event_sink);
        sink.try_emit(event_type, Some(payload));
    }
}

/// Releases a scope that never got published.
struct ReleaseOnFailure<'a> {
    scope: &'a RequestScope,
    request_id: Uuid,
    armed: bool,
}

impl<'a> ReleaseOnFailure<'a> {
    fn new(scope: &'a RequestScope, request_id: Uuid) -> Self {
        Self {
            scope,
            request_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseOnFailure<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let failures = self.scope.release();
        debug!(
            request_id = %self.request_id,
            scope_id = %self.scope.id(),
            failed_hooks = failures.len(),
            "Released unpublished request scope"
        );
    }
}

impl fmt::Debug for ScopeInitializationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeInitializationStage")
            .field("pipeline_config", &self.pipeline_config)
            .field("bindings", &self.bindings.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestStage for ScopeInitializationStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        self.initialize(&mut request)?;
        Ok(request)
    }
}
