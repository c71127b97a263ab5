//! Ordered provider binding tables.

use super::{same_provider, Provider, ProviderClass, ProviderId, ProviderInstance};
use crate::config::ClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a provider id is bound.
#[derive(Clone)]
pub enum Binding {
    /// Instantiated per scope from a class.
    Class(ProviderClass),
    /// A shared, ready-made instance.
    Instance(Arc<dyn Provider>),
}

impl Binding {
    /// Returns true if re-binding `other` over `self` would change nothing.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => same_provider(a, b),
            _ => false,
        }
    }

    /// Returns true for class bindings.
    #[must_use]
    pub fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(class) => f.debug_tuple("Class").field(class.id()).finish(),
            Self::Instance(provider) => f.debug_tuple("Instance").field(provider).finish(),
        }
    }
}

/// Where a binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// The shared pipeline configuration.
    Pipeline,
    /// A single request's configuration.
    Request,
}

/// A single binding with its registration order.
#[derive(Debug, Clone)]
pub struct BindingEntry {
    /// The bound provider id.
    pub id: ProviderId,
    /// The binding.
    pub binding: Binding,
    /// Where the binding came from.
    pub origin: BindingOrigin,
    /// Registration sequence; higher means registered later.
    pub sequence: u64,
}

/// Provider bindings keyed by id, last-registered-wins.
///
/// Re-binding an id with an identical binding keeps the original entry and
/// its sequence, so repeated registration is idempotent.
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    entries: HashMap<ProviderId, BindingEntry>,
    next_sequence: u64,
}

impl ProviderSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set whose sequences all order after `base`.
    #[must_use]
    pub fn layered_over(base: &Self) -> Self {
        Self {
            entries: HashMap::new(),
            next_sequence: base.next_sequence,
        }
    }

    /// Builds the pipeline-wide set: classes first, then instances.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut set = Self::new();
        for class in config.provider_classes() {
            set.bind_class(class, BindingOrigin::Pipeline);
        }
        for instance in config.provider_instances() {
            set.bind_instance(instance, BindingOrigin::Pipeline);
        }
        set
    }

    /// Binds an id. Returns false if the identical binding was already present.
    pub fn bind(&mut self, id: ProviderId, binding: Binding, origin: BindingOrigin) -> bool {
        if self
            .entries
            .get(&id)
            .is_some_and(|existing| existing.binding.is_identical(&binding))
        {
            return false;
        }
        self.insert(id, binding, origin);
        true
    }

    /// Binds a provider class.
    pub fn bind_class(&mut self, class: &ProviderClass, origin: BindingOrigin) -> bool {
        self.bind(class.id().clone(), Binding::Class(class.clone()), origin)
    }

    /// Binds a provider instance.
    pub fn bind_instance(&mut self, instance: &ProviderInstance, origin: BindingOrigin) -> bool {
        self.bind(
            instance.id().clone(),
            Binding::Instance(Arc::clone(instance.provider())),
            origin,
        )
    }

    /// Inserts without the identity check.
    pub(crate) fn insert(&mut self, id: ProviderId, binding: Binding, origin: BindingOrigin) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            id.clone(),
            BindingEntry {
                id,
                binding,
                origin,
                sequence,
            },
        );
    }

    /// Gets the binding for an id.
    #[must_use]
    pub fn get(&self, id: &ProviderId) -> Option<&BindingEntry> {
        self.entries.get(id)
    }

    /// Checks if an id is bound.
    #[must_use]
    pub fn contains(&self, id: &ProviderId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns all entries in registration order.
    #[must_use]
    pub fn entries(&self) -> Vec<&BindingEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        entries
    }

    /// Returns the number of bound ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all bindings, keeping the sequence counter.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{JsonProvider, PlainTextWriter};

    #[test]
    fn test_last_registered_wins() {
        let mut set = ProviderSet::new();
        set.bind_class(&ProviderClass::of::<JsonProvider>("writer"), BindingOrigin::Pipeline);
        set.bind_instance(
            &ProviderInstance::from_provider("writer", PlainTextWriter::default()),
            BindingOrigin::Request,
        );

        let entry = set.get(&ProviderId::new("writer")).unwrap();
        assert!(!entry.binding.is_class());
        assert_eq!(entry.origin, BindingOrigin::Request);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identical_rebinding_is_idempotent() {
        let mut set = ProviderSet::new();
        let class = ProviderClass::of::<JsonProvider>("json");

        assert!(set.bind_class(&class, BindingOrigin::Pipeline));
        let first = set.get(class.id()).unwrap().sequence;
        assert!(!set.bind_class(&class, BindingOrigin::Pipeline));

        assert_eq!(set.get(class.id()).unwrap().sequence, first);
    }

    #[test]
    fn test_entries_in_registration_order() {
        let mut set = ProviderSet::new();
        set.bind_class(&ProviderClass::of::<JsonProvider>("b"), BindingOrigin::Pipeline);
        set.bind_class(&ProviderClass::of::<JsonProvider>("a"), BindingOrigin::Pipeline);

        let ids: Vec<_> = set.entries().iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_layered_set_orders_after_base() {
        let mut base = ProviderSet::new();
        base.bind_class(&ProviderClass::of::<JsonProvider>("json"), BindingOrigin::Pipeline);

        let mut overlay = ProviderSet::layered_over(&base);
        overlay.bind_class(&ProviderClass::of::<JsonProvider>("other"), BindingOrigin::Request);

        let base_seq = base.get(&ProviderId::new("json")).unwrap().sequence;
        let overlay_seq = overlay.get(&ProviderId::new("other")).unwrap().sequence;
        assert!(overlay_seq > base_seq);
    }

    #[test]
    fn test_from_config_binds_instances_after_classes() {
        let config = ClientConfig::new()
            .with_instance(ProviderInstance::from_provider("json", JsonProvider::default()))
            .with_class(ProviderClass::of::<JsonProvider>("json"));

        let set = ProviderSet::from_config(&config);
        let entry = set.get(&ProviderId::new("json")).unwrap();
        assert!(!entry.binding.is_class());
    }
}
