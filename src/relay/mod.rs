//! Messaging relay
//!
//! Connection oriented publish/subscribe between browser assets and bundle
//! extensions. Groups are keyed by bundle name; a message published to a
//! group reaches every member except its sender.
//!
//! ## Session lifecycle
//!
//! ```text
//! connect ──► Connected ──hello──► Introduced ──close──► Disconnected
//!                 │                    │
//!                 └─ anything else is  └─ join / part / message
//!                    a protocol violation
//! ```
//!
//! All state sits behind one mutex. Every operation is a short synchronous
//! critical section; outbound frames go to per-connection unbounded queues
//! and in-process listener callbacks run after the lock is released.
//!
//! ## Modules
//!
//! - [`protocol`]: Wire messages
//! - [`listeners`]: In-process listener registry and handles
//! - [`socket`]: WebSocket transport

pub mod listeners;
pub mod protocol;
pub mod socket;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub use listeners::{Listener, ListenerHandle};
pub use protocol::{ClientIdentity, ClientKind, ClientMessage, Delivery, ServerMessage};

use crate::error::{OmphalosError, Result, protocol_violation};
use listeners::{ListenerId, ListenerRegistry};

/// Bundle name carrying administrative broadcasts such as toasts
pub const SYSTEM_BUNDLE: &str = "__omphalos_system__";

pub type ConnectionId = u64;

/// Outbound queue of a connection
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Severity of a dashboard toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    #[default]
    Message,
    Info,
    Warning,
    Success,
    Error,
}

/// `(bundle, graphic file)` of a single instance graphic, or `(owner, target)` of an interest
type Key = (String, String);

struct Session {
    outbox: Outbox,
    identity: Option<ClientIdentity>,
    groups: BTreeSet<String>,
    claim: Option<Key>,
}

#[derive(Default)]
struct RelayState {
    next_connection: ConnectionId,
    sessions: HashMap<ConnectionId, Session>,
    groups: BTreeMap<String, BTreeSet<ConnectionId>>,
    /// Extensions that joined a foreign bundle's group by listening to it
    extension_groups: BTreeMap<String, BTreeSet<String>>,
    interest: HashMap<Key, usize>,
    single_instance: HashSet<Key>,
    claims: HashMap<Key, ConnectionId>,
    listeners: ListenerRegistry,
}

impl RelayState {
    fn join(&mut self, id: ConnectionId, group: &str) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.groups.insert(group.to_string());
            self.groups.entry(group.to_string()).or_default().insert(id);
        }
    }

    fn part(&mut self, id: ConnectionId, group: &str) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.groups.remove(group);
        }
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    /// Single instance graphic a `hello` name refers to
    ///
    /// A graphic may announce itself by file (`clock.html`) or by file stem (`clock`).
    fn single_instance_key(&self, bundle: &str, name: &str) -> Option<Key> {
        self.single_instance
            .iter()
            .find(|(b, file)| {
                b == bundle
                    && (file == name
                        || Path::new(file).file_stem().and_then(|s| s.to_str()) == Some(name))
            })
            .cloned()
    }

    fn hello(&mut self, id: ConnectionId, identity: ClientIdentity) -> Result<()> {
        let session = self
            .sessions
            .get(&id)
            .ok_or_else(|| protocol_violation(id, "unknown connection"))?;
        if session.identity.is_some() {
            return Err(protocol_violation(id, "repeated hello"));
        }

        let claim = if identity.kind == ClientKind::Graphic {
            self.single_instance_key(&identity.bundle, &identity.name)
        } else {
            None
        };
        if let Some(key) = &claim {
            if self.claims.get(key).is_some_and(|&holder| holder != id) {
                return Err(OmphalosError::AssetInUse {
                    bundle: key.0.clone(),
                    asset: key.1.clone(),
                });
            }
            self.claims.insert(key.clone(), id);
        }

        let group = identity.bundle.clone();
        if let Some(session) = self.sessions.get_mut(&id) {
            tracing::debug!(
                connection = id,
                bundle = %identity.bundle,
                name = %identity.name,
                kind = ?identity.kind,
                "Client introduced"
            );
            session.identity = Some(identity);
            session.claim = claim;
        }
        self.join(id, &group);
        Ok(())
    }

    /// Queue an event for the group and collect the in-process listeners to run
    ///
    /// `sender` is excluded from socket delivery and `origin` from listener
    /// delivery.
    fn publish(
        &self,
        sender: Option<ConnectionId>,
        origin: Option<&str>,
        target: &str,
        event: &str,
        data: &Value,
    ) -> Vec<Listener> {
        if let Some(members) = self.groups.get(target) {
            for member in members.iter().filter(|&&member| Some(member) != sender) {
                if let Some(session) = self.sessions.get(member) {
                    let frame = ServerMessage::Message(Delivery {
                        bundle: target.to_string(),
                        event: event.to_string(),
                        data: data.clone(),
                    });
                    // a closed queue means the connection is going away
                    let _ = session.outbox.send(frame);
                }
            }
        }

        let joined = self.extension_groups.get(target);
        self.listeners
            .matching(event, target)
            .into_iter()
            .filter(|(owner, _)| Some(*owner) != origin)
            .filter(|(owner, _)| *owner == target || joined.is_some_and(|set| set.contains(*owner)))
            .map(|(_, callback)| callback)
            .collect()
    }

    fn drop_listener(&mut self, id: ListenerId) {
        let Some((owner, target)) = self.listeners.remove(id) else {
            return;
        };
        if owner == target {
            return;
        }

        let key = (owner, target);
        let remaining = match self.interest.get_mut(&key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.interest.remove(&key);
            let (owner, target) = key;
            tracing::debug!(bundle = %owner, group = %target, "Leaving group; no remaining listeners");
            if let Some(owners) = self.extension_groups.get_mut(&target) {
                owners.remove(&owner);
                if owners.is_empty() {
                    self.extension_groups.remove(&target);
                }
            }
        }
    }
}

/// Members of one group
#[cfg(test)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMembers {
    pub connections: Vec<ConnectionId>,
    /// Extensions of other bundles listening to this group
    pub extensions: Vec<String>,
}

/// Member counts of one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub connections: usize,
    pub extensions: usize,
}

/// Snapshot of relay activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub connections: usize,
    pub introduced: usize,
    pub groups: BTreeMap<String, GroupStats>,
    pub listeners: usize,
}

/// Handle to the relay; clones share the same state
#[derive(Clone, Default)]
pub struct Relay {
    state: Arc<Mutex<RelayState>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection; it must introduce itself before anything else
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let mut state = self.lock();
        state.next_connection += 1;
        let id = state.next_connection;
        state.sessions.insert(
            id,
            Session {
                outbox,
                identity: None,
                groups: BTreeSet::new(),
                claim: None,
            },
        );
        tracing::debug!(connection = id, "Client connected");
        id
    }

    /// Purge a connection's identity, memberships and single instance claim
    pub fn disconnect(&self, id: ConnectionId) {
        let mut state = self.lock();
        let Some(session) = state.sessions.remove(&id) else {
            return;
        };
        for group in &session.groups {
            if let Some(members) = state.groups.get_mut(group) {
                members.remove(&id);
                if members.is_empty() {
                    state.groups.remove(group);
                }
            }
        }
        if let Some(key) = session.claim {
            if state.claims.get(&key) == Some(&id) {
                state.claims.remove(&key);
            }
        }
        tracing::debug!(connection = id, "Client disconnected");
    }

    /// Apply a message received from a connection
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for messages the session's state does not
    /// allow and `AssetInUse` for a refused single instance `hello`. The
    /// message is dropped; the connection stays open.
    pub fn handle(&self, id: ConnectionId, message: ClientMessage) -> Result<()> {
        let mut state = self.lock();
        let introduced = match state.sessions.get(&id) {
            Some(session) => session.identity.is_some(),
            None => return Err(protocol_violation(id, "unknown connection")),
        };

        match message {
            ClientMessage::Hello(identity) => state.hello(id, identity),
            _ if !introduced => Err(protocol_violation(id, "message before hello")),
            ClientMessage::Join(group) => {
                state.join(id, &group);
                Ok(())
            }
            ClientMessage::Part(group) => {
                state.part(id, &group);
                Ok(())
            }
            ClientMessage::Message(envelope) => {
                let (Some(bundle), Some(event)) = (envelope.bundle, envelope.event) else {
                    return Err(protocol_violation(id, "message without bundle or event"));
                };
                let listeners = state.publish(Some(id), None, &bundle, &event, &envelope.data);
                drop(state);
                for listener in listeners {
                    listener(&envelope.data);
                }
                Ok(())
            }
        }
    }

    /// Publish an event on behalf of a bundle extension
    ///
    /// Reaches every connection in `target`'s group and every in-process
    /// listener not owned by `origin`.
    pub fn send_from_bundle(&self, origin: &str, target: &str, event: &str, data: Value) {
        let listeners = self.lock().publish(None, Some(origin), target, event, &data);
        for listener in listeners {
            listener(&data);
        }
    }

    /// Ask dashboards to display a toast
    pub fn toast(&self, message: &str, level: ToastLevel, timeout: Option<Duration>) {
        let timeout = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        let payload = json!({ "toast": message, "level": level, "timeout": timeout });
        self.send_from_bundle(SYSTEM_BUNDLE, SYSTEM_BUNDLE, "toast", payload);
    }

    /// Register an in-process listener for `event` in `target`'s group
    ///
    /// The first listener an owner registers on a foreign bundle joins the
    /// owner to that group; removing the last one parts it.
    pub fn listen(&self, owner: &str, event: &str, target: &str, listener: Listener) -> ListenerHandle {
        let mut state = self.lock();
        let id = state.listeners.add(owner, event, target, listener);
        if owner != target {
            let count = state
                .interest
                .entry((owner.to_string(), target.to_string()))
                .or_insert(0);
            *count += 1;
            if *count == 1 {
                tracing::debug!(bundle = %owner, group = %target, "Joining group to listen for {event}");
                state
                    .extension_groups
                    .entry(target.to_string())
                    .or_default()
                    .insert(owner.to_string());
            }
        }
        drop(state);
        ListenerHandle::new(self.clone(), id, event, target)
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) {
        self.lock().drop_listener(id);
    }

    /// Remove every listener owned by a bundle, returning how many were removed
    pub fn remove_listeners_of(&self, owner: &str) -> usize {
        let mut state = self.lock();
        let ids = state.listeners.owned_by(owner);
        for &id in &ids {
            state.drop_listener(id);
        }
        ids.len()
    }

    /// Mark a graphic as single instance
    pub fn register_single_instance(&self, bundle: &str, file: &str) {
        self.lock()
            .single_instance
            .insert((bundle.to_string(), file.to_string()));
    }

    /// Whether a live session currently displays the single instance graphic
    pub fn is_claimed(&self, bundle: &str, file: &str) -> bool {
        self.lock()
            .claims
            .contains_key(&(bundle.to_string(), file.to_string()))
    }

    #[cfg(test)]
    pub fn members(&self, group: &str) -> GroupMembers {
        let state = self.lock();
        GroupMembers {
            connections: state
                .groups
                .get(group)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default(),
            extensions: state
                .extension_groups
                .get(group)
                .map(|m| m.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn stats(&self) -> RelayStats {
        let state = self.lock();
        let mut groups: BTreeMap<String, GroupStats> = BTreeMap::new();
        for (group, members) in &state.groups {
            groups.entry(group.clone()).or_default().connections = members.len();
        }
        for (group, owners) in &state.extension_groups {
            groups.entry(group.clone()).or_default().extensions = owners.len();
        }
        RelayStats {
            connections: state.sessions.len(),
            introduced: state
                .sessions
                .values()
                .filter(|s| s.identity.is_some())
                .count(),
            groups,
            listeners: state.listeners.len(),
        }
    }
}
