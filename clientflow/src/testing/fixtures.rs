//! Provider fixtures for pipeline testing.

use crate::providers::{Provider, ProviderClass, ProviderId};
use crate::services::{
    ContextResolver, ExceptionMapper, MappedError, MediaType, MessageBodyReader, MessageBodyWriter,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reads and writes `application/json` entities.
#[derive(Debug, Default)]
pub struct JsonProvider;

impl MessageBodyWriter for JsonProvider {
    fn is_writeable(&self, media_type: &MediaType) -> bool {
        media_type.is_compatible(&MediaType::application_json())
    }

    fn write_to(&self, entity: &serde_json::Value, _media_type: &MediaType) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(entity)?)
    }
}

impl MessageBodyReader for JsonProvider {
    fn is_readable(&self, media_type: &MediaType) -> bool {
        media_type.is_compatible(&MediaType::application_json())
    }

    fn read_from(&self, body: &[u8], _media_type: &MediaType) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_slice(body)?)
    }
}

impl Provider for JsonProvider {
    fn as_message_body_reader(&self) -> Option<&dyn MessageBodyReader> {
        Some(self)
    }

    fn as_message_body_writer(&self) -> Option<&dyn MessageBodyWriter> {
        Some(self)
    }
}

/// Writes string entities as `text/plain`.
#[derive(Debug, Default)]
pub struct PlainTextWriter;

impl MessageBodyWriter for PlainTextWriter {
    fn is_writeable(&self, media_type: &MediaType) -> bool {
        media_type.is_compatible(&MediaType::text_plain())
    }

    fn write_to(&self, entity: &serde_json::Value, _media_type: &MediaType) -> anyhow::Result<Vec<u8>> {
        match entity.as_str() {
            Some(text) => Ok(text.as_bytes().to_vec()),
            None => anyhow::bail!("plain text entities must be strings"),
        }
    }
}

impl Provider for PlainTextWriter {
    fn as_message_body_writer(&self) -> Option<&dyn MessageBodyWriter> {
        Some(self)
    }
}

/// Maps errors whose message contains a substring to a status.
#[derive(Debug, Clone)]
pub struct StatusMapper {
    needle: String,
    status: u16,
}

impl StatusMapper {
    /// Creates a mapper. An empty needle matches every error.
    #[must_use]
    pub fn new(needle: impl Into<String>, status: u16) -> Self {
        Self {
            needle: needle.into(),
            status,
        }
    }
}

impl ExceptionMapper for StatusMapper {
    fn map(&self, error: &anyhow::Error) -> Option<MappedError> {
        let message = format!("{error:#}");
        message
            .contains(&self.needle)
            .then(|| MappedError::new(self.status, message))
    }
}

impl Provider for StatusMapper {
    fn as_exception_mapper(&self) -> Option<&dyn ExceptionMapper> {
        Some(self)
    }
}

/// Resolves one fixed value for one context type and media type.
#[derive(Debug, Clone)]
pub struct StaticContextResolver {
    context_type: String,
    media_type: MediaType,
    value: serde_json::Value,
}

impl StaticContextResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        context_type: impl Into<String>,
        media_type: MediaType,
        value: serde_json::Value,
    ) -> Self {
        Self {
            context_type: context_type.into(),
            media_type,
            value,
        }
    }
}

impl ContextResolver for StaticContextResolver {
    fn context_type(&self) -> &str {
        &self.context_type
    }

    fn resolve(&self, media_type: &MediaType) -> Option<serde_json::Value> {
        self.media_type
            .is_compatible(media_type)
            .then(|| self.value.clone())
    }
}

impl Provider for StaticContextResolver {
    fn as_context_resolver(&self) -> Option<&dyn ContextResolver> {
        Some(self)
    }
}

/// Counts how many times it is closed.
#[derive(Debug, Clone)]
pub struct ClosingProvider {
    closed: Arc<AtomicUsize>,
}

impl ClosingProvider {
    /// Creates a provider reporting closes into `closed`.
    #[must_use]
    pub fn new(closed: Arc<AtomicUsize>) -> Self {
        Self { closed }
    }

    /// A provider class whose every instance reports into `closed`.
    #[must_use]
    pub fn class(id: impl Into<ProviderId>, closed: Arc<AtomicUsize>) -> ProviderClass {
        ProviderClass::new(id, move || {
            Ok(Arc::new(Self::new(Arc::clone(&closed))) as Arc<dyn Provider>)
        })
    }
}

impl Provider for ClosingProvider {
    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A provider whose factory always fails.
#[derive(Debug)]
pub struct FailingFactoryProvider;

impl FailingFactoryProvider {
    /// A provider class that cannot be instantiated.
    #[must_use]
    pub fn class(id: impl Into<ProviderId>) -> ProviderClass {
        ProviderClass::new(id, || Err(anyhow::anyhow!("connection pool exhausted")))
    }
}

impl Provider for FailingFactoryProvider {}
