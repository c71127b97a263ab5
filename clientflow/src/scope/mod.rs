//! Request scopes.
//!
//! This module provides:
//! - `RequestScope`, the per-exchange container with its five service slots
//! - `ResolutionContext`, the scope-isolated provider registrations
//! - `ReleaseRegistry`, LIFO release hooks for scope-owned resources

mod release;
mod request_scope;
mod resolution;

pub use release::ReleaseRegistry;
pub use request_scope::{RequestScope, ScopeServices, ScopeSlot, ScopeState};
pub use resolution::{ResolutionContext, ScopedProvider};
