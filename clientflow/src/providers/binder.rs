//! Scope-isolated provider registration.

use super::{ProviderClass, ProviderInstance};
use crate::scope::ResolutionContext;
use tracing::debug;

/// Accepts request-level provider registrations for one scope.
///
/// Registrations are additive and land in the given context only; they
/// never become visible to another scope and never remove pipeline-wide
/// bindings. Re-registering an identical identity is a no-op.
pub trait ProviderSink: Send + Sync {
    /// Registers provider classes. Returns how many bindings changed.
    fn register_classes(&self, ctx: &ResolutionContext, classes: &[ProviderClass]) -> usize;

    /// Registers provider instances. Returns how many bindings changed.
    fn register_instances(&self, ctx: &ResolutionContext, instances: &[ProviderInstance]) -> usize;
}

/// Default sink: binds into the scope's overlay, last-registered-wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderBinder;

impl ProviderBinder {
    /// Creates a new binder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProviderSink for ProviderBinder {
    fn register_classes(&self, ctx: &ResolutionContext, classes: &[ProviderClass]) -> usize {
        let bound = classes.iter().filter(|class| ctx.bind_class(class)).count();
        debug!(
            scope_id = %ctx.scope_id(),
            offered = classes.len(),
            bound,
            "Registered provider classes"
        );
        bound
    }

    fn register_instances(&self, ctx: &ResolutionContext, instances: &[ProviderInstance]) -> usize {
        let bound = instances
            .iter()
            .filter(|instance| ctx.bind_instance(instance))
            .count();
        debug!(
            scope_id = %ctx.scope_id(),
            offered = instances.len(),
            bound,
            "Registered provider instances"
        );
        bound
    }
}
