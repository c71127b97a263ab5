//! Exception translation service.

use super::newest_first;
use crate::providers::{ProviderContract, ProviderId};
use crate::scope::ScopedProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The result of translating an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedError {
    /// Status code to report.
    pub status: u16,
    /// Caller-facing message.
    pub message: String,
}

impl MappedError {
    /// Creates a mapped error.
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Translates errors it recognizes.
pub trait ExceptionMapper: Send + Sync {
    /// Maps an error, or returns `None` to let the next mapper try.
    fn map(&self, error: &anyhow::Error) -> Option<MappedError>;
}

/// Exception mappers available to one request scope.
#[derive(Debug, Clone)]
pub struct ExceptionMappers {
    scope_id: Uuid,
    mappers: Vec<ScopedProvider>,
}

impl ExceptionMappers {
    /// Builds the table from a scope's effective providers.
    #[must_use]
    pub fn new(scope_id: Uuid, providers: &[ScopedProvider]) -> Self {
        Self {
            scope_id,
            mappers: newest_first(providers, ProviderContract::ExceptionMapper),
        }
    }

    /// Returns the scope these mappers belong to.
    #[must_use]
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Maps an error with the first mapper that recognizes it.
    #[must_use]
    pub fn map(&self, error: &anyhow::Error) -> Option<MappedError> {
        self.mappers
            .iter()
            .filter_map(|p| p.provider.as_exception_mapper())
            .find_map(|mapper| mapper.map(error))
    }

    /// Returns mapper ids, newest first.
    #[must_use]
    pub fn mapper_ids(&self) -> Vec<&ProviderId> {
        self.mappers.iter().map(|p| &p.id).collect()
    }

    /// Returns the number of mappers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Returns true if no mapper is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
