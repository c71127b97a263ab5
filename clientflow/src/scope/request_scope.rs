//! The per-exchange scope and its service slots.

use super::ResolutionContext;
use crate::config::ClientConfig;
use crate::errors::ScopeConflictError;
use crate::providers::ProviderSet;
use crate::request::RequestContext;
use crate::services::{ContextResolvers, ExceptionMappers, MessageBodyWorkers};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// The named slots of a request scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSlot {
    /// The request's configuration snapshot.
    Configuration,
    /// The exception-mapping service.
    ExceptionMappers,
    /// The message-body service.
    MessageBodyWorkers,
    /// The context-resolution service.
    ContextResolvers,
    /// The request the scope belongs to.
    RequestContext,
}

impl ScopeSlot {
    /// All slots.
    pub const ALL: [Self; 5] = [
        Self::Configuration,
        Self::ExceptionMappers,
        Self::MessageBodyWorkers,
        Self::ContextResolvers,
        Self::RequestContext,
    ];

    /// Returns the slot name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::ExceptionMappers => "exception_mappers",
            Self::MessageBodyWorkers => "message_body_workers",
            Self::ContextResolvers => "context_resolvers",
            Self::RequestContext => "request_context",
        }
    }
}

impl fmt::Display for ScopeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeState {
    /// No slot is set.
    Uninitialized,
    /// Every slot is set. Terminal.
    Initialized,
}

/// The five values published into a scope in one step.
#[derive(Debug, Clone)]
pub struct ScopeServices {
    /// The request's configuration snapshot.
    pub configuration: Arc<ClientConfig>,
    /// The exception-mapping service.
    pub exception_mappers: Arc<ExceptionMappers>,
    /// The message-body service.
    pub message_body_workers: Arc<MessageBodyWorkers>,
    /// The context-resolution service.
    pub context_resolvers: Arc<ContextResolvers>,
    /// The request the scope belongs to.
    pub request_context: RequestContext,
}

struct ScopeInner {
    id: Uuid,
    created_at: DateTime<Utc>,
    resolution: ResolutionContext,
    services: OnceLock<ScopeServices>,
    released: AtomicBool,
}

impl ScopeInner {
    fn release(&self) -> Vec<(String, String)> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        self.resolution.release()
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let failures = self.release();
        if !failures.is_empty() {
            warn!(scope_id = %self.id, failures = failures.len(), "Scope released with failing hooks");
        }
    }
}

/// The state container for exactly one request/response exchange.
///
/// Cloning yields another handle to the same scope. The scope is released
/// when the last handle drops; a scope that failed to initialize is released
/// as soon as the failure is detected.
///
/// All five slots are published together: readers observe either none of
/// them or all of them, and a published scope cannot be written again.
#[derive(Clone)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

impl RequestScope {
    /// Creates an empty scope over the pipeline-wide provider bindings.
    #[must_use]
    pub fn new(pipeline: Arc<ProviderSet>) -> Self {
        let id = Uuid::new_v4();
        Self {
            inner: Arc::new(ScopeInner {
                id,
                created_at: Utc::now(),
                resolution: ResolutionContext::new(id, pipeline),
                services: OnceLock::new(),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the scope id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns when the scope was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Returns the scope's provider resolution context.
    #[must_use]
    pub fn resolution(&self) -> &ResolutionContext {
        &self.inner.resolution
    }

    /// Publishes all five slots.
    ///
    /// # Errors
    ///
    /// Returns `ScopeConflictError` if the scope was already published.
    pub fn publish(&self, services: ScopeServices) -> Result<(), ScopeConflictError> {
        self.inner
            .services
            .set(services)
            .map_err(|_| ScopeConflictError::new(self.id(), ScopeSlot::Configuration.as_str()))
    }

    /// Returns the scope state.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        if self.inner.services.get().is_some() {
            ScopeState::Initialized
        } else {
            ScopeState::Uninitialized
        }
    }

    /// Returns true once every slot is set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state() == ScopeState::Initialized
    }

    /// Returns all published services.
    #[must_use]
    pub fn services(&self) -> Option<&ScopeServices> {
        self.inner.services.get()
    }

    /// Returns true if a slot is set.
    #[must_use]
    pub fn is_set(&self, _slot: ScopeSlot) -> bool {
        // slots are published together
        self.is_initialized()
    }

    /// Returns the slots that are set.
    #[must_use]
    pub fn populated_slots(&self) -> Vec<ScopeSlot> {
        ScopeSlot::ALL.into_iter().filter(|s| self.is_set(*s)).collect()
    }

    /// The `configuration` slot.
    #[must_use]
    pub fn configuration(&self) -> Option<&Arc<ClientConfig>> {
        self.services().map(|s| &s.configuration)
    }

    /// The `exception_mappers` slot.
    #[must_use]
    pub fn exception_mappers(&self) -> Option<&Arc<ExceptionMappers>> {
        self.services().map(|s| &s.exception_mappers)
    }

    /// The `message_body_workers` slot.
    #[must_use]
    pub fn message_body_workers(&self) -> Option<&Arc<MessageBodyWorkers>> {
        self.services().map(|s| &s.message_body_workers)
    }

    /// The `context_resolvers` slot.
    #[must_use]
    pub fn context_resolvers(&self) -> Option<&Arc<ContextResolvers>> {
        self.services().map(|s| &s.context_resolvers)
    }

    /// The `request_context` slot.
    #[must_use]
    pub fn request_context(&self) -> Option<&RequestContext> {
        self.services().map(|s| &s.request_context)
    }

    /// Releases scope-owned resources of an unpublished scope. Idempotent.
    ///
    /// A published scope stays live until its last handle drops, so this is
    /// a no-op once `is_initialized` returns true. Returns the release hooks
    /// that panicked.
    pub(crate) fn release(&self) -> Vec<(String, String)> {
        if self.is_initialized() {
            debug!(scope_id = %self.id(), "Published scope is released on drop only");
            return Vec::new();
        }
        self.inner.release()
    }

    /// Returns true if the scope has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Returns true if both handles point at the same scope.
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("released", &self.is_released())
            .field("resolution", self.resolution())
            .finish()
    }
}
