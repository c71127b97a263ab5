//! Per-scope provider resolution.

use super::ReleaseRegistry;
use crate::providers::{
    Binding, BindingEntry, BindingOrigin, Provider, ProviderClass, ProviderId, ProviderInstance,
    ProviderSet,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A provider made available to one scope.
#[derive(Debug, Clone)]
pub struct ScopedProvider {
    /// The provider id.
    pub id: ProviderId,
    /// The provider object: shared for instances, scope-owned for classes.
    pub provider: Arc<dyn Provider>,
    /// Where the binding came from.
    pub origin: BindingOrigin,
    /// Registration sequence; higher means registered later.
    pub sequence: u64,
}

/// The providers visible to one request scope.
///
/// Layers request registrations over the shared pipeline set. The pipeline
/// set is never modified; everything registered here is dropped with the
/// scope.
pub struct ResolutionContext {
    scope_id: Uuid,
    pipeline: Arc<ProviderSet>,
    overlay: RwLock<ProviderSet>,
    /// Class instances created for this scope only.
    instances: DashMap<ProviderId, Arc<dyn Provider>>,
    releases: ReleaseRegistry,
}

impl ResolutionContext {
    /// Creates a context over the pipeline-wide bindings.
    #[must_use]
    pub fn new(scope_id: Uuid, pipeline: Arc<ProviderSet>) -> Self {
        let overlay = ProviderSet::layered_over(&pipeline);
        Self {
            scope_id,
            pipeline,
            overlay: RwLock::new(overlay),
            instances: DashMap::new(),
            releases: ReleaseRegistry::new(),
        }
    }

    /// Returns the owning scope id.
    #[must_use]
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Returns the shared pipeline bindings.
    #[must_use]
    pub fn pipeline_bindings(&self) -> &Arc<ProviderSet> {
        &self.pipeline
    }

    /// Binds a class for this scope. Returns false if nothing changed.
    pub fn bind_class(&self, class: &ProviderClass) -> bool {
        self.bind(class.id().clone(), Binding::Class(class.clone()))
    }

    /// Binds an instance for this scope. Returns false if nothing changed.
    pub fn bind_instance(&self, instance: &ProviderInstance) -> bool {
        self.bind(
            instance.id().clone(),
            Binding::Instance(Arc::clone(instance.provider())),
        )
    }

    fn bind(&self, id: ProviderId, binding: Binding) -> bool {
        let mut overlay = self.overlay.write();
        let current = overlay.get(&id).or_else(|| self.pipeline.get(&id));
        if current.is_some_and(|entry| entry.binding.is_identical(&binding)) {
            return false;
        }
        overlay.insert(id, binding, BindingOrigin::Request);
        true
    }

    /// Returns the number of request-level bindings.
    #[must_use]
    pub fn request_binding_count(&self) -> usize {
        self.overlay.read().len()
    }

    /// Returns the effective bindings in registration order.
    #[must_use]
    pub fn effective_bindings(&self) -> Vec<BindingEntry> {
        let overlay = self.overlay.read();
        let mut entries: Vec<BindingEntry> = self
            .pipeline
            .entries()
            .into_iter()
            .filter(|e| !overlay.contains(&e.id))
            .cloned()
            .collect();
        entries.extend(overlay.entries().into_iter().cloned());
        entries.sort_by_key(|e| e.sequence);
        entries
    }

    /// Resolves every effective binding to a provider object.
    ///
    /// Classes are instantiated at most once per scope; each instance gets a
    /// release hook that closes it when the scope is released.
    pub fn resolve_providers(&self) -> anyhow::Result<Vec<ScopedProvider>> {
        self.effective_bindings()
            .into_iter()
            .map(|entry| {
                let provider = match &entry.binding {
                    Binding::Instance(provider) => Arc::clone(provider),
                    Binding::Class(class) => self.instantiate(class)?,
                };
                Ok(ScopedProvider {
                    id: entry.id,
                    provider,
                    origin: entry.origin,
                    sequence: entry.sequence,
                })
            })
            .collect()
    }

    fn instantiate(&self, class: &ProviderClass) -> anyhow::Result<Arc<dyn Provider>> {
        let instance = self
            .instances
            .entry(class.id().clone())
            .or_try_insert_with(|| {
                let provider = class.instantiate()?;
                let owned = Arc::clone(&provider);
                self.releases
                    .register(format!("close:{}", class.id()), move || owned.close());
                debug!(scope_id = %self.scope_id, provider = %class.id(), "Instantiated provider class");
                Ok::<_, anyhow::Error>(provider)
            })?;
        Ok(Arc::clone(&*instance))
    }

    /// Returns the number of class instances owned by this scope.
    #[must_use]
    pub fn owned_instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Closes scope-owned instances and drops request-level bindings.
    ///
    /// Returns the release hooks that panicked.
    pub(crate) fn release(&self) -> Vec<(String, String)> {
        let failures = self.releases.run_all();
        self.instances.clear();
        self.overlay.write().clear();
        failures
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("scope_id", &self.scope_id)
            .field("pipeline_bindings", &self.pipeline.len())
            .field("request_bindings", &self.request_binding_count())
            .field("owned_instances", &self.owned_instance_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::same_provider;
    use crate::testing::{ClosingProvider, FailingFactoryProvider, JsonProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline_with_json() -> Arc<ProviderSet> {
        let mut set = ProviderSet::new();
        set.bind_class(&ProviderClass::of::<JsonProvider>("json"), BindingOrigin::Pipeline);
        Arc::new(set)
    }

    #[test]
    fn test_request_bindings_do_not_touch_pipeline() {
        let pipeline = pipeline_with_json();
        let ctx = ResolutionContext::new(Uuid::new_v4(), pipeline.clone());

        assert!(ctx.bind_class(&ProviderClass::of::<JsonProvider>("extra")));

        assert_eq!(pipeline.len(), 1);
        assert_eq!(ctx.effective_bindings().len(), 2);
    }

    #[test]
    fn test_rebinding_pipeline_class_is_noop() {
        let ctx = ResolutionContext::new(Uuid::new_v4(), pipeline_with_json());

        assert!(!ctx.bind_class(&ProviderClass::of::<JsonProvider>("json")));
        assert_eq!(ctx.request_binding_count(), 0);
    }

    #[test]
    fn test_instance_shadows_pipeline_class() {
        let ctx = ResolutionContext::new(Uuid::new_v4(), pipeline_with_json());
        let instance = ProviderInstance::from_provider("json", JsonProvider::default());

        assert!(ctx.bind_instance(&instance));
        let providers = ctx.resolve_providers().unwrap();

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].origin, BindingOrigin::Request);
        assert!(same_provider(&providers[0].provider, instance.provider()));
    }

    #[test]
    fn test_classes_instantiated_once_per_scope() {
        let pipeline = pipeline_with_json();
        let a = ResolutionContext::new(Uuid::new_v4(), pipeline.clone());
        let b = ResolutionContext::new(Uuid::new_v4(), pipeline);

        let a1 = a.resolve_providers().unwrap();
        let a2 = a.resolve_providers().unwrap();
        let b1 = b.resolve_providers().unwrap();

        assert!(same_provider(&a1[0].provider, &a2[0].provider));
        assert!(!same_provider(&a1[0].provider, &b1[0].provider));
        assert_eq!(a.owned_instance_count(), 1);
    }

    #[test]
    fn test_factory_failure_propagates() {
        let ctx = ResolutionContext::new(Uuid::new_v4(), Arc::new(ProviderSet::new()));
        ctx.bind_class(&FailingFactoryProvider::class("broken"));

        let err = ctx.resolve_providers().unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
        assert_eq!(ctx.owned_instance_count(), 0);
    }

    #[test]
    fn test_release_closes_owned_instances() {
        let closed = Arc::new(AtomicUsize::new(0));
        let ctx = ResolutionContext::new(Uuid::new_v4(), Arc::new(ProviderSet::new()));
        ctx.bind_class(&ClosingProvider::class("closing", closed.clone()));
        ctx.bind_instance(&ProviderInstance::from_provider(
            "shared",
            ClosingProvider::new(closed.clone()),
        ));

        ctx.resolve_providers().unwrap();
        assert!(ctx.release().is_empty());

        // only the class instance is scope-owned
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.owned_instance_count(), 0);
        assert_eq!(ctx.request_binding_count(), 0);
    }
}
