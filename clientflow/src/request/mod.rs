//! Outbound requests and their frozen context view.

use crate::cancellation::CancellationToken;
use crate::config::ClientConfig;
use crate::providers::{ProviderClass, ProviderInstance};
use crate::scope::RequestScope;
use crate::services::{MediaType, MessageBodyWorkers};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Returns the method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request travelling through the pipeline.
///
/// The request owns its configuration snapshot. Registrations made through
/// `configure` or `register_*` copy the snapshot on first write, so a
/// snapshot shared with the client is never changed underneath it.
#[derive(Debug)]
pub struct ClientRequest {
    id: Uuid,
    method: Method,
    uri: String,
    headers: BTreeMap<String, String>,
    entity: Option<serde_json::Value>,
    media_type: Option<MediaType>,
    body: Option<Vec<u8>>,
    configuration: Option<Arc<ClientConfig>>,
    workers: Option<Arc<MessageBodyWorkers>>,
    scope: Option<RequestScope>,
    cancellation: Arc<CancellationToken>,
}

impl ClientRequest {
    /// Creates a request with no configuration snapshot.
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            uri: uri.into(),
            headers: BTreeMap::new(),
            entity: None,
            media_type: None,
            body: None,
            configuration: None,
            workers: None,
            scope: None,
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the configuration snapshot.
    #[must_use]
    pub fn with_configuration(mut self, configuration: Arc<ClientConfig>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Adds a header. Header names are lowercased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the entity and its media type.
    #[must_use]
    pub fn with_entity(mut self, entity: serde_json::Value, media_type: MediaType) -> Self {
        self.entity = Some(entity);
        self.set_media_type(media_type);
        self
    }

    /// Sets the entity, leaving the media type to entity serialization.
    #[must_use]
    pub fn with_untyped_entity(mut self, entity: serde_json::Value) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Edits the request's configuration snapshot, creating one if absent.
    pub fn configure<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut ClientConfig),
    {
        let config = self
            .configuration
            .get_or_insert_with(|| Arc::new(ClientConfig::new()));
        edit(Arc::make_mut(config));
    }

    /// Registers a provider class for this request only.
    #[must_use]
    pub fn register_class(mut self, class: ProviderClass) -> Self {
        self.configure(|config| {
            config.register_class(class);
        });
        self
    }

    /// Registers a provider instance for this request only.
    #[must_use]
    pub fn register_instance(mut self, instance: ProviderInstance) -> Self {
        self.configure(|config| {
            config.register_instance(instance);
        });
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the target URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the entity, if any.
    #[must_use]
    pub fn entity(&self) -> Option<&serde_json::Value> {
        self.entity.as_ref()
    }

    /// Returns the entity media type, if any.
    #[must_use]
    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    /// Returns the serialized body, if produced.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Stores the serialized body.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    /// Returns the configuration snapshot.
    #[must_use]
    pub fn configuration(&self) -> Option<&Arc<ClientConfig>> {
        self.configuration.as_ref()
    }

    /// Returns the message-body workers attached by scope initialization.
    #[must_use]
    pub fn message_body_workers(&self) -> Option<&Arc<MessageBodyWorkers>> {
        self.workers.as_ref()
    }

    /// Returns the scope this request is bound to.
    #[must_use]
    pub fn scope(&self) -> Option<&RequestScope> {
        self.scope.as_ref()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Binds the request to an initialized scope.
    pub(crate) fn set_media_type(&mut self, media_type: MediaType) {
        self.headers
            .insert("content-type".to_string(), media_type.to_string());
        self.media_type = Some(media_type);
    }

    pub(crate) fn attach_scope(&mut self, scope: RequestScope, workers: Arc<MessageBodyWorkers>) {
        self.workers = Some(workers);
        self.scope = Some(scope);
    }
}

/// A frozen view of a request, as published into its scope.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// The request id.
    pub request_id: Uuid,
    /// The method.
    pub method: Method,
    /// The target URI.
    pub uri: String,
    /// Headers at capture time.
    pub headers: BTreeMap<String, String>,
    /// The entity media type, if any.
    pub media_type: Option<MediaType>,
    /// Whether the request carries an entity.
    pub has_entity: bool,
    /// When the view was captured.
    pub captured_at: DateTime<Utc>,
}

impl RequestContext {
    /// Captures the current state of a request.
    #[must_use]
    pub fn capture(request: &ClientRequest) -> Self {
        Self {
            request_id: request.id(),
            method: request.method(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
            media_type: request.media_type().cloned(),
            has_entity: request.entity().is_some(),
            captured_at: Utc::now(),
        }
    }

    /// Converts to a JSON value for event payloads.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "request_id": self.request_id.to_string(),
            "method": self.method.as_str(),
            "uri": self.uri,
            "media_type": self.media_type.as_ref().map(ToString::to_string),
            "has_entity": self.has_entity,
        })
    }
}
