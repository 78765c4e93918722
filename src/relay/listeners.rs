//! In-process event listeners
//!
//! Extensions subscribe to `(event, bundle)` pairs without a socket. The
//! registry lives inside the relay state; callbacks are cloned out and run
//! after the relay lock is released.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::Relay;
use crate::error::{Result, relay::double_unlisten};

pub type ListenerId = u64;

/// Callback invoked with the data of a matching event
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    owner: String,
    event: String,
    target: String,
    callback: Listener,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: ListenerId,
    entries: BTreeMap<ListenerId, Entry>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, owner: &str, event: &str, target: &str, callback: Listener) -> ListenerId {
        self.next_id += 1;
        self.entries.insert(
            self.next_id,
            Entry {
                owner: owner.to_string(),
                event: event.to_string(),
                target: target.to_string(),
                callback,
            },
        );
        self.next_id
    }

    /// Remove a listener, returning its `(owner, target)`
    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<(String, String)> {
        self.entries.remove(&id).map(|entry| (entry.owner, entry.target))
    }

    /// Callbacks registered for `(event, target)`, with their owners, in registration order
    pub(crate) fn matching(&self, event: &str, target: &str) -> Vec<(&str, Listener)> {
        self.entries
            .values()
            .filter(|entry| entry.event == event && entry.target == target)
            .map(|entry| (entry.owner.as_str(), Arc::clone(&entry.callback)))
            .collect()
    }

    /// Ids of every listener owned by `owner`
    pub(crate) fn owned_by(&self, owner: &str) -> Vec<ListenerId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(&id, _)| id)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle to an in-process listener
///
/// Dropping the handle keeps the listener registered; call
/// [`ListenerHandle::unlisten`] to remove it.
pub struct ListenerHandle {
    relay: Relay,
    id: ListenerId,
    event: String,
    bundle: String,
    removed: AtomicBool,
}

impl ListenerHandle {
    pub(crate) fn new(relay: Relay, id: ListenerId, event: &str, bundle: &str) -> Self {
        Self {
            relay,
            id,
            event: event.to_string(),
            bundle: bundle.to_string(),
            removed: AtomicBool::new(false),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Bundle whose events this listener receives
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// Remove the listener
    ///
    /// # Errors
    ///
    /// Returns `DoubleUnlisten` when the listener was already removed.
    pub fn unlisten(&self) -> Result<()> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Err(double_unlisten(&self.event, &self.bundle));
        }
        self.relay.remove_listener(self.id);
        Ok(())
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("bundle", &self.bundle)
            .field("removed", &self.removed.load(Ordering::SeqCst))
            .finish()
    }
}
