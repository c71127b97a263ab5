//! Mock resolvers and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::errors::{ClientflowError, ServiceKind, ServiceMaterializationError};
use crate::request::ClientRequest;
use crate::resolver::{ProviderServiceResolver, ServiceResolver};
use crate::scope::RequestScope;
use crate::services::{ContextResolvers, ExceptionMappers, MessageBodyWorkers};
use crate::stages::RequestStage;

/// A resolver that delegates to `ProviderServiceResolver` and can inject
/// failures.
///
/// Keeps a handle to every scope it was asked to serve, so tests can inspect
/// scopes whose initialization failed.
#[derive(Debug, Default)]
pub struct FaultInjectingResolver {
    inner: ProviderServiceResolver,
    fail_on: Option<ServiceKind>,
    cancel: Option<Arc<CancellationToken>>,
    scopes: Mutex<Vec<RequestScope>>,
    calls: Mutex<Vec<ServiceKind>>,
}

impl FaultInjectingResolver {
    /// Creates a resolver that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every materialization of `service`.
    #[must_use]
    pub fn failing_on(mut self, service: ServiceKind) -> Self {
        self.fail_on = Some(service);
        self
    }

    /// Cancels `token` while materializing message-body workers.
    #[must_use]
    pub fn cancelling(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the scopes served so far, in order.
    #[must_use]
    pub fn scopes(&self) -> Vec<RequestScope> {
        self.scopes.lock().clone()
    }

    /// Returns the most recent scope.
    #[must_use]
    pub fn last_scope(&self) -> Option<RequestScope> {
        self.scopes.lock().last().cloned()
    }

    /// Returns every materialization request, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceKind> {
        self.calls.lock().clone()
    }

    fn record(
        &self,
        service: ServiceKind,
        scope: &RequestScope,
    ) -> Result<(), ServiceMaterializationError> {
        self.calls.lock().push(service);
        {
            let mut scopes = self.scopes.lock();
            if !scopes.iter().any(|s| s.same_scope(scope)) {
                scopes.push(scope.clone());
            }
        }
        if self.fail_on == Some(service) {
            return Err(ServiceMaterializationError::new(
                service,
                scope.id(),
                "injected failure",
            ));
        }
        Ok(())
    }
}

impl ServiceResolver for FaultInjectingResolver {
    fn materialize_exception_mappers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ExceptionMappers>, ServiceMaterializationError> {
        self.record(ServiceKind::ExceptionMappers, scope)?;
        self.inner.materialize_exception_mappers(scope)
    }

    fn materialize_message_body_workers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<MessageBodyWorkers>, ServiceMaterializationError> {
        self.record(ServiceKind::MessageBodyWorkers, scope)?;
        if let Some(token) = &self.cancel {
            token.cancel("cancelled during materialization");
        }
        self.inner.materialize_message_body_workers(scope)
    }

    fn materialize_context_resolvers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ContextResolvers>, ServiceMaterializationError> {
        self.record(ServiceKind::ContextResolvers, scope)?;
        self.inner.materialize_context_resolvers(scope)
    }
}

/// A stage that records the requests it sees.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    seen: Mutex<Vec<RecordedRequest>>,
}

/// What a `RecordingStage` observed about one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// The request id.
    pub request_id: uuid::Uuid,
    /// The attached scope id, if any.
    pub scope_id: Option<uuid::Uuid>,
    /// Whether message-body workers were attached.
    pub has_workers: bool,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns everything recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.seen.lock().clone()
    }

    /// Returns the number of requests seen.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl RequestStage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        self.seen.lock().push(RecordedRequest {
            request_id: request.id(),
            scope_id: request.scope().map(RequestScope::id),
            has_workers: request.message_body_workers().is_some(),
        });
        Ok(request)
    }
}

/// A stage that yields to the runtime before passing the request on.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a stage sleeping `ms` milliseconds per request.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl RequestStage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        tokio::time::sleep(self.delay).await;
        Ok(request)
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    reason: String,
}

impl FailingStage {
    /// Creates a stage failing with a cancellation carrying `reason`.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RequestStage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        Err(ClientflowError::Cancelled(self.reason.clone()))
    }
}
