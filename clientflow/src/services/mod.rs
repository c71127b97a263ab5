//! Request-scoped service lookup tables.
//!
//! Each table is built from the providers effective in one request scope and
//! remembers that scope's id. Lookups consult providers newest-first, so a
//! request-level registration shadows a pipeline-level one offering the same
//! capability.

mod context_resolvers;
mod exception_mappers;
mod media;
mod message_body;

pub use context_resolvers::{ContextResolver, ContextResolvers};
pub use exception_mappers::{ExceptionMapper, ExceptionMappers, MappedError};
pub use media::MediaType;
pub use message_body::{MessageBodyReader, MessageBodyWorkers, MessageBodyWriter};

use crate::providers::ProviderContract;
use crate::scope::ScopedProvider;

/// Keeps providers offering `contract`, newest registration first.
fn newest_first(providers: &[ScopedProvider], contract: ProviderContract) -> Vec<ScopedProvider> {
    let mut matching: Vec<ScopedProvider> = providers
        .iter()
        .filter(|p| contract.is_implemented_by(p.provider.as_ref()))
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.sequence.cmp(&a.sequence));
    matching
}
