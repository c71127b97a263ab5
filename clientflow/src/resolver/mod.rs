//! Materialization of request-scoped services.

use crate::config::StageSettings;
use crate::errors::{ServiceKind, ServiceMaterializationError};
use crate::providers::ProviderContract;
use crate::scope::{RequestScope, ScopedProvider};
use crate::services::{ContextResolvers, ExceptionMappers, MessageBodyWorkers};
use std::sync::Arc;
use tracing::debug;

/// Produces the services bound to one request scope.
///
/// Implementations hold no per-request state. Every returned service is
/// built for the given scope and must not be handed to another one.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceResolver: Send + Sync {
    /// Builds the exception-mapping service.
    fn materialize_exception_mappers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ExceptionMappers>, ServiceMaterializationError>;

    /// Builds the message-body service.
    fn materialize_message_body_workers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<MessageBodyWorkers>, ServiceMaterializationError>;

    /// Builds the context-resolution service.
    fn materialize_context_resolvers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ContextResolvers>, ServiceMaterializationError>;
}

/// Builds services from the providers effective in a scope.
///
/// Fails when a provider class cannot be instantiated, or when a required
/// contract has no provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderServiceResolver {
    required: Vec<ProviderContract>,
}

impl ProviderServiceResolver {
    /// Creates a resolver with no required contracts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver enforcing the settings' required contracts.
    #[must_use]
    pub fn from_settings(settings: &StageSettings) -> Self {
        Self {
            required: settings.required_contracts.clone(),
        }
    }

    /// Requires a contract to have at least one provider.
    #[must_use]
    pub fn with_required_contract(mut self, contract: ProviderContract) -> Self {
        if !self.required.contains(&contract) {
            self.required.push(contract);
        }
        self
    }

    /// Returns the required contracts.
    #[must_use]
    pub fn required_contracts(&self) -> &[ProviderContract] {
        &self.required
    }

    fn providers_for(
        &self,
        service: ServiceKind,
        scope: &RequestScope,
    ) -> Result<Vec<ScopedProvider>, ServiceMaterializationError> {
        let providers = scope
            .resolution()
            .resolve_providers()
            .map_err(|e| ServiceMaterializationError::from_provider(service, scope.id(), &e))?;

        for contract in contracts_of(service) {
            if !self.required.contains(contract) {
                continue;
            }
            let offered = providers
                .iter()
                .any(|p| contract.is_implemented_by(p.provider.as_ref()));
            if !offered {
                return Err(ServiceMaterializationError::new(
                    service,
                    scope.id(),
                    format!("no provider implements required contract {contract:?}"),
                ));
            }
        }

        debug!(scope_id = %scope.id(), %service, providers = providers.len(), "Materializing service");
        Ok(providers)
    }
}

fn contracts_of(service: ServiceKind) -> &'static [ProviderContract] {
    match service {
        ServiceKind::ExceptionMappers => &[ProviderContract::ExceptionMapper],
        ServiceKind::MessageBodyWorkers => &[
            ProviderContract::MessageBodyReader,
            ProviderContract::MessageBodyWriter,
        ],
        ServiceKind::ContextResolvers => &[ProviderContract::ContextResolver],
    }
}

impl ServiceResolver for ProviderServiceResolver {
    fn materialize_exception_mappers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ExceptionMappers>, ServiceMaterializationError> {
        let providers = self.providers_for(ServiceKind::ExceptionMappers, scope)?;
        Ok(Arc::new(ExceptionMappers::new(scope.id(), &providers)))
    }

    fn materialize_message_body_workers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<MessageBodyWorkers>, ServiceMaterializationError> {
        let providers = self.providers_for(ServiceKind::MessageBodyWorkers, scope)?;
        Ok(Arc::new(MessageBodyWorkers::new(scope.id(), &providers)))
    }

    fn materialize_context_resolvers(
        &self,
        scope: &RequestScope,
    ) -> Result<Arc<ContextResolvers>, ServiceMaterializationError> {
        let providers = self.providers_for(ServiceKind::ContextResolvers, scope)?;
        Ok(Arc::new(ContextResolvers::new(scope.id(), &providers)))
    }
}
