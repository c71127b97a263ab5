//! Assertions over request scopes.

use crate::request::ClientRequest;
use crate::scope::ScopeSlot;
use std::sync::Arc;

/// Asserts that the request carries a fully published scope whose workers
/// are the ones attached to the request.
pub fn assert_scope_initialized(request: &ClientRequest) {
    let scope = request
        .scope()
        .unwrap_or_else(|| panic!("request {} has no scope", request.id()));
    assert_eq!(
        scope.populated_slots(),
        ScopeSlot::ALL.to_vec(),
        "scope {} is missing slots",
        scope.id()
    );

    let attached = request
        .message_body_workers()
        .unwrap_or_else(|| panic!("request {} has no message body workers", request.id()));
    let published = scope
        .message_body_workers()
        .unwrap_or_else(|| panic!("scope {} has no message body workers", scope.id()));
    assert!(
        Arc::ptr_eq(attached, published),
        "request {} carries workers of another scope",
        request.id()
    );
    assert_eq!(published.scope_id(), scope.id());
    assert_eq!(
        scope.request_context().map(|c| c.request_id),
        Some(request.id()),
        "scope {} holds another request's context",
        scope.id()
    );
}

/// Asserts that the request was left without scope or workers.
pub fn assert_scope_unpublished(request: &ClientRequest) {
    assert!(
        request.scope().is_none(),
        "request {} unexpectedly has a scope",
        request.id()
    );
    assert!(
        request.message_body_workers().is_none(),
        "request {} unexpectedly has message body workers",
        request.id()
    );
}
