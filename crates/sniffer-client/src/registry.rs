//! Process-wide hook registry.
//!
//! Hooks registered here are consulted by every client built with the
//! default configuration ([`default_client`](crate::default_client) or
//! [`ClientBuilder::with_default_hooks`](crate::ClientBuilder::with_default_hooks)).
//! Registration is keyed by hook name; registering the same name twice is a
//! no-op.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::client::{ProtocolHook, Request};

static HOOKS: Lazy<RwLock<Vec<Arc<dyn ProtocolHook>>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Registers a hook ahead of all previously registered ones.
///
/// Returns false if a hook with the same name is already registered.
pub fn register_hook(hook: Arc<dyn ProtocolHook>) -> bool {
    let mut hooks = HOOKS.write();
    if hooks.iter().any(|existing| existing.name() == hook.name()) {
        tracing::debug!("Hook {} is already registered", hook.name());
        return false;
    }

    tracing::debug!("Registered hook {}", hook.name());
    hooks.insert(0, hook);
    true
}

/// Registers a hook ahead of all others, evicting any hook with the same
/// name under the same lock.
///
/// Returns true if an existing hook was evicted.
pub(crate) fn replace_hook(hook: Arc<dyn ProtocolHook>) -> bool {
    let mut hooks = HOOKS.write();
    let before = hooks.len();
    hooks.retain(|existing| existing.name() != hook.name());
    let replaced = before != hooks.len();

    tracing::debug!("Registered hook {} (replaced={})", hook.name(), replaced);
    hooks.insert(0, hook);
    replaced
}

/// Removes a hook by name. Returns true if it was registered.
pub fn unregister_hook(name: &str) -> bool {
    let mut hooks = HOOKS.write();
    let before = hooks.len();
    hooks.retain(|hook| hook.name() != name);
    before != hooks.len()
}

/// Returns the names of all registered hooks, in consultation order.
pub fn registered_hooks() -> Vec<String> {
    HOOKS.read().iter().map(|hook| hook.name().to_string()).collect()
}

pub(crate) fn find_hook(request: &Request) -> Option<Arc<dyn ProtocolHook>> {
    HOOKS
        .read()
        .iter()
        .find(|hook| hook.can_handle(request))
        .cloned()
}
