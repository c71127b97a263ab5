//! Entity serialization through the request's attached workers.

use super::RequestStage;
use crate::errors::{ClientflowError, InvalidRequestError};
use crate::request::ClientRequest;
use crate::services::MediaType;
use async_trait::async_trait;
use tracing::debug;

/// Serializes the request entity into its body.
///
/// Uses the message-body workers attached by scope initialization, so it
/// must run after `ScopeInitializationStage`. Requests without an entity
/// pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct EntitySerializationStage {
    default_media_type: Option<MediaType>,
}

impl EntitySerializationStage {
    /// Stage name.
    pub const NAME: &'static str = "entity_serialization";

    /// Creates the stage. Entities without a media type are written as JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the media type used when the request does not name one.
    #[must_use]
    pub fn with_default_media_type(mut self, media_type: MediaType) -> Self {
        self.default_media_type = Some(media_type);
        self
    }

    fn serialize(&self, request: &mut ClientRequest) -> Result<(), ClientflowError> {
        if request.entity().is_none() {
            return Ok(());
        }
        request.cancellation().check()?;

        let workers = request
            .message_body_workers()
            .cloned()
            .ok_or_else(|| InvalidRequestError::scope_not_initialized(request.id()))?;
        if request.media_type().is_none() {
            let fallback = self
                .default_media_type
                .clone()
                .unwrap_or_else(MediaType::application_json);
            request.set_media_type(fallback);
        }

        let (Some(entity), Some(media_type)) = (request.entity(), request.media_type()) else {
            return Ok(());
        };
        let body = workers.write_entity(entity, media_type)?;
        debug!(
            request_id = %request.id(),
            scope_id = %workers.scope_id(),
            media_type = %media_type,
            bytes = body.len(),
            "Serialized request entity"
        );
        request.set_body(body);
        Ok(())
    }
}

#[async_trait]
impl RequestStage for EntitySerializationStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut request: ClientRequest) -> Result<ClientRequest, ClientflowError> {
        self.serialize(&mut request)?;
        Ok(request)
    }
}
