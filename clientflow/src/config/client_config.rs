//! Provider and property snapshot for a client or a single request.

use crate::providers::{ProviderClass, ProviderInstance};
use std::collections::HashMap;
use std::fmt;

/// Registered providers and properties.
///
/// A client holds one behind an `Arc` for its whole lifetime; requests start
/// from a clone of it and may add their own registrations.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Provider classes in registration order, unique by id.
    classes: Vec<ProviderClass>,
    /// Provider instances in registration order.
    instances: Vec<ProviderInstance>,
    /// Free-form properties.
    properties: HashMap<String, serde_json::Value>,
}

impl ClientConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider class.
    #[must_use]
    pub fn with_class(mut self, class: ProviderClass) -> Self {
        self.register_class(class);
        self
    }

    /// Adds a provider instance.
    #[must_use]
    pub fn with_instance(mut self, instance: ProviderInstance) -> Self {
        self.register_instance(instance);
        self
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.set_property(key, value);
        self
    }

    /// Registers a provider class, last-registered-wins per id.
    ///
    /// A class with the same id but a different provider is replaced and the
    /// new one moves to the end. Returns false if the identical class is
    /// already registered.
    pub fn register_class(&mut self, class: ProviderClass) -> bool {
        if self.classes.contains(&class) {
            return false;
        }
        self.classes.retain(|existing| existing.id() != class.id());
        self.classes.push(class);
        true
    }

    /// Registers a provider instance.
    ///
    /// Returns false if this exact instance is already registered under the
    /// same id.
    pub fn register_instance(&mut self, instance: ProviderInstance) -> bool {
        if self.instances.contains(&instance) {
            return false;
        }
        self.instances.push(instance);
        true
    }

    /// Sets a property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(key.into(), value);
    }

    /// Gets a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    /// Returns the registered provider classes in order.
    #[must_use]
    pub fn provider_classes(&self) -> &[ProviderClass] {
        &self.classes
    }

    /// Returns the registered provider instances in order.
    #[must_use]
    pub fn provider_instances(&self) -> &[ProviderInstance] {
        &self.instances
    }

    /// Returns true if no providers or properties are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.instances.is_empty() && self.properties.is_empty()
    }

    /// Returns a copy with `other`'s registrations appended.
    ///
    /// Properties from `other` replace ours.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for class in &other.classes {
            merged.register_class(class.clone());
        }
        for instance in &other.instances {
            merged.register_instance(instance.clone());
        }
        for (key, value) in &other.properties {
            merged.set_property(key.clone(), value.clone());
        }
        merged
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class_ids: Vec<&str> = self.classes.iter().map(|c| c.id().as_str()).collect();
        let instance_ids: Vec<&str> = self.instances.iter().map(|i| i.id().as_str()).collect();
        f.debug_struct("ClientConfig")
            .field("classes", &class_ids)
            .field("instances", &instance_ids)
            .field("properties", &self.properties)
            .finish()
    }
}
