//! The capability object handed to bundle extensions

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::extension::Symbols;
use crate::manifest::Manifest;
use crate::relay::{Listener, ListenerHandle, Relay, ToastLevel};

/// Exported symbols of every bundle that finished loading
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    inner: Arc<RwLock<HashMap<String, Symbols>>>,
}

impl SymbolTable {
    pub fn insert(&self, bundle: &str, symbols: Symbols) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bundle.to_string(), symbols);
    }

    /// Symbols of `bundle`, or an empty object if it has not loaded
    pub fn get(&self, bundle: &str) -> Symbols {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bundle)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, bundle: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(bundle)
    }
}

/// Severity of an extension log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Logger tagged with the bundle an extension belongs to
#[derive(Debug, Clone)]
pub struct BundleLog {
    bundle: String,
}

impl BundleLog {
    pub fn log(&self, level: LogLevel, message: &str) {
        let bundle = self.bundle.as_str();
        match level {
            LogLevel::Error => tracing::error!(target: "omphalos::extension", bundle, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "omphalos::extension", bundle, "{message}"),
            LogLevel::Info => tracing::info!(target: "omphalos::extension", bundle, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "omphalos::extension", bundle, "{message}"),
            LogLevel::Trace => tracing::trace!(target: "omphalos::extension", bundle, "{message}"),
        }
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
}

/// Bundle scoped access to the host
///
/// Every operation acts on behalf of the bundle the API was created for.
#[derive(Clone)]
pub struct BundleApi {
    bundle: Arc<Manifest>,
    relay: Relay,
    symbols: SymbolTable,
}

impl BundleApi {
    pub fn new(bundle: Arc<Manifest>, relay: Relay, symbols: SymbolTable) -> Self {
        Self {
            bundle,
            relay,
            symbols,
        }
    }

    pub fn name(&self) -> &str {
        &self.bundle.name
    }

    pub fn log(&self) -> BundleLog {
        BundleLog {
            bundle: self.bundle.name.clone(),
        }
    }

    /// Snapshot of the bundle's manifest
    pub fn bundle_info(&self) -> &Manifest {
        &self.bundle
    }

    /// Symbols exported by another bundle, empty if it has not loaded
    pub fn require(&self, name: &str) -> Symbols {
        if !self.symbols.contains(name) {
            tracing::debug!(bundle = %self.bundle.name, required = name, "Required bundle has not loaded");
        }
        self.symbols.get(name)
    }

    /// Publish an event to this bundle's group
    pub fn send_message(&self, event: &str, data: Value) {
        self.relay
            .send_from_bundle(&self.bundle.name, &self.bundle.name, event, data);
    }

    /// Publish an event to another bundle's group
    pub fn send_message_to_bundle(&self, event: &str, bundle: &str, data: Value) {
        self.relay
            .send_from_bundle(&self.bundle.name, bundle, event, data);
    }

    /// Listen for `event` in `bundle`'s group, this bundle's own by default
    pub fn listen_for(&self, event: &str, bundle: Option<&str>, listener: Listener) -> ListenerHandle {
        let target = bundle.unwrap_or(&self.bundle.name);
        self.relay.listen(&self.bundle.name, event, target, listener)
    }

    pub fn toast(&self, message: &str, level: ToastLevel, timeout: Option<Duration>) {
        self.relay.toast(message, level, timeout);
    }

    pub(crate) fn relay(&self) -> &Relay {
        &self.relay
    }
}
