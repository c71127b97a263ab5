//! Context resolution service.

use super::{newest_first, MediaType};
use crate::providers::{ProviderContract, ProviderId};
use crate::scope::ScopedProvider;
use uuid::Uuid;

/// Supplies a contextual object of one type, per media type.
pub trait ContextResolver: Send + Sync {
    /// The context type this resolver supplies.
    fn context_type(&self) -> &str;

    /// Returns the context for `media_type`, or `None` if not applicable.
    fn resolve(&self, media_type: &MediaType) -> Option<serde_json::Value>;
}

/// Context resolvers available to one request scope.
#[derive(Debug, Clone)]
pub struct ContextResolvers {
    scope_id: Uuid,
    resolvers: Vec<ScopedProvider>,
}

impl ContextResolvers {
    /// Builds the table from a scope's effective providers.
    #[must_use]
    pub fn new(scope_id: Uuid, providers: &[ScopedProvider]) -> Self {
        Self {
            scope_id,
            resolvers: newest_first(providers, ProviderContract::ContextResolver),
        }
    }

    /// Returns the scope these resolvers belong to.
    #[must_use]
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Resolves a context of `context_type` for `media_type`.
    #[must_use]
    pub fn resolve(&self, context_type: &str, media_type: &MediaType) -> Option<serde_json::Value> {
        self.resolvers
            .iter()
            .filter_map(|p| p.provider.as_context_resolver())
            .filter(|r| r.context_type() == context_type)
            .find_map(|r| r.resolve(media_type))
    }

    /// Returns resolver ids, newest first.
    #[must_use]
    pub fn resolver_ids(&self) -> Vec<&ProviderId> {
        self.resolvers.iter().map(|p| &p.id).collect()
    }

    /// Returns the number of resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolver is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::BindingOrigin;
    use crate::testing::StaticContextResolver;
    use std::sync::Arc;

    #[test]
    fn test_resolve_by_type_and_media() {
        let resolvers = ContextResolvers::new(
            Uuid::new_v4(),
            &[
                ScopedProvider {
                    id: ProviderId::new("json-settings"),
                    provider: Arc::new(StaticContextResolver::new(
                        "serializer-settings",
                        MediaType::application_json(),
                        serde_json::json!({"pretty": true}),
                    )),
                    origin: BindingOrigin::Pipeline,
                    sequence: 0,
                },
            ],
        );

        let json = MediaType::application_json();
        assert_eq!(
            resolvers.resolve("serializer-settings", &json),
            Some(serde_json::json!({"pretty": true}))
        );
        assert!(resolvers.resolve("serializer-settings", &MediaType::text_plain()).is_none());
        assert!(resolvers.resolve("other", &json).is_none());
    }
}
