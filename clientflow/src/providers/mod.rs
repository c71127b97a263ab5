//! Pluggable providers and their registration.
//!
//! A provider is an extension (serializer, exception mapper, context
//! resolver) registered either as a class, which is instantiated fresh for
//! every request scope, or as a ready-made instance shared as-is.
//!
//! This module provides:
//! - The `Provider` trait and its capability accessors
//! - `ProviderClass` / `ProviderInstance` registrations keyed by `ProviderId`
//! - `ProviderSet`, an ordered last-registered-wins binding table
//! - `ProviderSink`, the scope-isolated registration entry point

mod binder;
mod registry;

pub use binder::{ProviderBinder, ProviderSink};
pub use registry::{Binding, BindingEntry, BindingOrigin, ProviderSet};

use crate::services::{ContextResolver, ExceptionMapper, MessageBodyReader, MessageBodyWriter};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// The capabilities a provider can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderContract {
    /// Deserializes response entities.
    MessageBodyReader,
    /// Serializes request entities.
    MessageBodyWriter,
    /// Translates errors into mapped failures.
    ExceptionMapper,
    /// Supplies contextual objects per media type.
    ContextResolver,
}

impl ProviderContract {
    /// Lists the contracts a provider implements.
    #[must_use]
    pub fn of(provider: &dyn Provider) -> Vec<Self> {
        let mut contracts = Vec::new();
        if provider.as_message_body_reader().is_some() {
            contracts.push(Self::MessageBodyReader);
        }
        if provider.as_message_body_writer().is_some() {
            contracts.push(Self::MessageBodyWriter);
        }
        if provider.as_exception_mapper().is_some() {
            contracts.push(Self::ExceptionMapper);
        }
        if provider.as_context_resolver().is_some() {
            contracts.push(Self::ContextResolver);
        }
        contracts
    }

    /// Returns true if the provider implements this contract.
    #[must_use]
    pub fn is_implemented_by(&self, provider: &dyn Provider) -> bool {
        match self {
            Self::MessageBodyReader => provider.as_message_body_reader().is_some(),
            Self::MessageBodyWriter => provider.as_message_body_writer().is_some(),
            Self::ExceptionMapper => provider.as_exception_mapper().is_some(),
            Self::ContextResolver => provider.as_context_resolver().is_some(),
        }
    }
}

/// Identity of a provider registration.
///
/// Two registrations with the same id describe the same service; the later
/// one replaces the earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a new provider id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A pluggable extension.
///
/// Implementors override the accessors for the capabilities they offer.
pub trait Provider: Send + Sync + fmt::Debug {
    /// Returns the reader capability, if any.
    fn as_message_body_reader(&self) -> Option<&dyn MessageBodyReader> {
        None
    }

    /// Returns the writer capability, if any.
    fn as_message_body_writer(&self) -> Option<&dyn MessageBodyWriter> {
        None
    }

    /// Returns the exception-mapping capability, if any.
    fn as_exception_mapper(&self) -> Option<&dyn ExceptionMapper> {
        None
    }

    /// Returns the context-resolution capability, if any.
    fn as_context_resolver(&self) -> Option<&dyn ContextResolver> {
        None
    }

    /// Releases resources held by a scope-owned instance.
    ///
    /// Called once when the owning request scope is released. Never called
    /// for instances registered through `ProviderInstance`.
    fn close(&self) {}
}

/// Fallible constructor for a provider class.
pub type ProviderFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Provider>> + Send + Sync>;

/// A provider registered by class: instantiated once per request scope.
#[derive(Clone)]
pub struct ProviderClass {
    id: ProviderId,
    factory: ProviderFactory,
    provider_type: Option<TypeId>,
}

impl ProviderClass {
    /// Creates a provider class from a factory.
    pub fn new<F>(id: impl Into<ProviderId>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            factory: Arc::new(factory),
            provider_type: None,
        }
    }

    /// Creates a provider class for a default-constructible provider.
    #[must_use]
    pub fn of<P>(id: impl Into<ProviderId>) -> Self
    where
        P: Provider + Default + 'static,
    {
        Self {
            provider_type: Some(TypeId::of::<P>()),
            ..Self::new(id, || Ok(Arc::new(P::default()) as Arc<dyn Provider>))
        }
    }

    /// Returns the provider id.
    #[must_use]
    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Builds a fresh instance.
    pub fn instantiate(&self) -> anyhow::Result<Arc<dyn Provider>> {
        (self.factory)().with_context(|| format!("cannot instantiate provider class '{}'", self.id))
    }
}

/// Identical classes share the id and build the same provider: the same
/// type for `ProviderClass::of`, otherwise the same factory.
impl PartialEq for ProviderClass {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id {
            return false;
        }
        match (self.provider_type, other.provider_type) {
            (Some(a), Some(b)) => a == b,
            _ => std::ptr::eq(
                Arc::as_ptr(&self.factory).cast::<()>(),
                Arc::as_ptr(&other.factory).cast::<()>(),
            ),
        }
    }
}

impl Eq for ProviderClass {}

impl fmt::Debug for ProviderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClass").field("id", &self.id).finish()
    }
}

/// A provider registered as a ready-made, shared instance.
#[derive(Clone)]
pub struct ProviderInstance {
    id: ProviderId,
    provider: Arc<dyn Provider>,
}

impl ProviderInstance {
    /// Wraps a shared provider.
    #[must_use]
    pub fn new(id: impl Into<ProviderId>, provider: Arc<dyn Provider>) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }

    /// Wraps an owned provider.
    #[must_use]
    pub fn from_provider<P>(id: impl Into<ProviderId>, provider: P) -> Self
    where
        P: Provider + 'static,
    {
        Self::new(id, Arc::new(provider))
    }

    /// Returns the provider id.
    #[must_use]
    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Returns the shared provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }
}

/// Identical instances share both id and object.
impl PartialEq for ProviderInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && same_provider(&self.provider, &other.provider)
    }
}

impl Eq for ProviderInstance {}

impl fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderInstance")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Compares two providers by object address, ignoring vtables.
#[must_use]
pub fn same_provider(a: &Arc<dyn Provider>, b: &Arc<dyn Provider>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
