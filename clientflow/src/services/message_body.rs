//! Entity serialization service.

use super::{newest_first, MediaType};
use crate::errors::EntityError;
use crate::providers::{Provider, ProviderContract, ProviderId};
use crate::scope::ScopedProvider;
use std::sync::Arc;
use uuid::Uuid;

/// Serializes request entities.
pub trait MessageBodyWriter: Send + Sync {
    /// Returns true if this writer can produce `media_type`.
    fn is_writeable(&self, media_type: &MediaType) -> bool;

    /// Serializes an entity.
    fn write_to(&self, entity: &serde_json::Value, media_type: &MediaType) -> anyhow::Result<Vec<u8>>;
}

/// Deserializes response entities.
pub trait MessageBodyReader: Send + Sync {
    /// Returns true if this reader can consume `media_type`.
    fn is_readable(&self, media_type: &MediaType) -> bool;

    /// Deserializes an entity.
    fn read_from(&self, body: &[u8], media_type: &MediaType) -> anyhow::Result<serde_json::Value>;
}

/// Readers and writers available to one request scope.
#[derive(Debug, Clone)]
pub struct MessageBodyWorkers {
    scope_id: Uuid,
    readers: Vec<ScopedProvider>,
    writers: Vec<ScopedProvider>,
}

impl MessageBodyWorkers {
    /// Builds the table from a scope's effective providers.
    #[must_use]
    pub fn new(scope_id: Uuid, providers: &[ScopedProvider]) -> Self {
        Self {
            scope_id,
            readers: newest_first(providers, ProviderContract::MessageBodyReader),
            writers: newest_first(providers, ProviderContract::MessageBodyWriter),
        }
    }

    /// Returns the scope these workers belong to.
    #[must_use]
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Finds the provider that will write `media_type`.
    #[must_use]
    pub fn writer_provider_for(&self, media_type: &MediaType) -> Option<&ScopedProvider> {
        self.writers.iter().find(|p| {
            p.provider
                .as_message_body_writer()
                .is_some_and(|w| w.is_writeable(media_type))
        })
    }

    /// Finds the provider that will read `media_type`.
    #[must_use]
    pub fn reader_provider_for(&self, media_type: &MediaType) -> Option<&ScopedProvider> {
        self.readers.iter().find(|p| {
            p.provider
                .as_message_body_reader()
                .is_some_and(|r| r.is_readable(media_type))
        })
    }

    /// Finds a writer for `media_type`.
    #[must_use]
    pub fn writer_for(&self, media_type: &MediaType) -> Option<&dyn MessageBodyWriter> {
        self.writer_provider_for(media_type)
            .and_then(|p| p.provider.as_message_body_writer())
    }

    /// Finds a reader for `media_type`.
    #[must_use]
    pub fn reader_for(&self, media_type: &MediaType) -> Option<&dyn MessageBodyReader> {
        self.reader_provider_for(media_type)
            .and_then(|p| p.provider.as_message_body_reader())
    }

    /// Serializes an entity with the newest matching writer.
    pub fn write_entity(
        &self,
        entity: &serde_json::Value,
        media_type: &MediaType,
    ) -> Result<Vec<u8>, EntityError> {
        let scoped = self
            .writer_provider_for(media_type)
            .ok_or_else(|| EntityError::NoWriter {
                media_type: media_type.to_string(),
            })?;
        let writer = writer_of(&scoped.provider, media_type)?;
        writer
            .write_to(entity, media_type)
            .map_err(|e| provider_failure(&scoped.id, &e))
    }

    /// Deserializes a body with the newest matching reader.
    pub fn read_entity(
        &self,
        body: &[u8],
        media_type: &MediaType,
    ) -> Result<serde_json::Value, EntityError> {
        let scoped = self
            .reader_provider_for(media_type)
            .ok_or_else(|| EntityError::NoReader {
                media_type: media_type.to_string(),
            })?;
        let reader = scoped
            .provider
            .as_message_body_reader()
            .ok_or_else(|| EntityError::NoReader {
                media_type: media_type.to_string(),
            })?;
        reader
            .read_from(body, media_type)
            .map_err(|e| provider_failure(&scoped.id, &e))
    }

    /// Returns writer ids, newest first.
    #[must_use]
    pub fn writer_ids(&self) -> Vec<&ProviderId> {
        self.writers.iter().map(|p| &p.id).collect()
    }

    /// Returns reader ids, newest first.
    #[must_use]
    pub fn reader_ids(&self) -> Vec<&ProviderId> {
        self.readers.iter().map(|p| &p.id).collect()
    }
}

fn writer_of<'a>(
    provider: &'a Arc<dyn Provider>,
    media_type: &MediaType,
) -> Result<&'a dyn MessageBodyWriter, EntityError> {
    provider
        .as_message_body_writer()
        .ok_or_else(|| EntityError::NoWriter {
            media_type: media_type.to_string(),
        })
}

fn provider_failure(id: &ProviderId, err: &anyhow::Error) -> EntityError {
    EntityError::Provider {
        provider: id.to_string(),
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{same_provider, BindingOrigin};
    use crate::testing::{JsonProvider, PlainTextWriter};

    fn scoped(id: &str, provider: Arc<dyn Provider>, sequence: u64) -> ScopedProvider {
        ScopedProvider {
            id: ProviderId::new(id),
            provider,
            origin: BindingOrigin::Pipeline,
            sequence,
        }
    }

    #[test]
    fn test_newest_writer_wins() {
        let old: Arc<dyn Provider> = Arc::new(JsonProvider::default());
        let new: Arc<dyn Provider> = Arc::new(JsonProvider::default());
        let workers = MessageBodyWorkers::new(
            Uuid::new_v4(),
            &[scoped("old", old, 0), scoped("new", new.clone(), 1)],
        );

        let chosen = workers
            .writer_provider_for(&MediaType::application_json())
            .unwrap();
        assert_eq!(chosen.id.as_str(), "new");
        assert!(same_provider(&chosen.provider, &new));
    }

    #[test]
    fn test_write_and_read_json() {
        let workers = MessageBodyWorkers::new(
            Uuid::new_v4(),
            &[scoped("json", Arc::new(JsonProvider::default()), 0)],
        );
        let media = MediaType::application_json();
        let entity = serde_json::json!({"name": "widget", "qty": 3});

        let body = workers.write_entity(&entity, &media).unwrap();
        assert_eq!(workers.read_entity(&body, &media).unwrap(), entity);
    }

    #[test]
    fn test_missing_writer() {
        let workers = MessageBodyWorkers::new(
            Uuid::new_v4(),
            &[scoped("json", Arc::new(JsonProvider::default()), 0)],
        );

        let err = workers
            .write_entity(&serde_json::json!("hi"), &MediaType::text_plain())
            .unwrap_err();
        assert!(matches!(err, EntityError::NoWriter { .. }));
    }

    #[test]
    fn test_writer_only_provider_is_not_a_reader() {
        let workers = MessageBodyWorkers::new(
            Uuid::new_v4(),
            &[scoped("text", Arc::new(PlainTextWriter::default()), 0)],
        );

        assert_eq!(workers.writer_ids().len(), 1);
        assert!(workers.reader_ids().is_empty());
        assert!(workers.reader_for(&MediaType::text_plain()).is_none());
    }

    #[test]
    fn test_provider_failure_names_provider() {
        let workers = MessageBodyWorkers::new(
            Uuid::new_v4(),
            &[scoped("text", Arc::new(PlainTextWriter::default()), 0)],
        );

        let err = workers
            .write_entity(&serde_json::json!({"not": "text"}), &MediaType::text_plain())
            .unwrap_err();
        assert!(err.to_string().contains("'text'"));
    }
}
