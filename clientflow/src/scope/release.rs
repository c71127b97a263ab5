//! Release hooks for resources acquired inside a scope.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// A named release hook.
struct ReleaseHook {
    name: String,
    hook: Box<dyn FnOnce() + Send>,
}

/// Release hooks executed in LIFO order.
///
/// A panicking hook is logged and does not stop the remaining hooks.
#[derive(Default)]
pub struct ReleaseRegistry {
    hooks: Mutex<Vec<ReleaseHook>>,
}

impl ReleaseRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook.
    pub fn register<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.hooks.lock().push(ReleaseHook {
            name: name.into(),
            hook: Box::new(hook),
        });
    }

    /// Runs and drops all hooks, newest first.
    ///
    /// Returns `(name, message)` for each hook that panicked.
    pub fn run_all(&self) -> Vec<(String, String)> {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let mut failures = Vec::new();

        for ReleaseHook { name, hook } in hooks.into_iter().rev() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
                let message = panic_message(panic.as_ref());
                warn!(hook = %name, %message, "Release hook panicked");
                failures.push((name, message));
            }
        }

        failures
    }

    /// Returns the number of pending hooks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.hooks.lock().len()
    }
}

impl std::fmt::Debug for ReleaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseRegistry")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "release hook panicked".to_string())
}
