//! Extensions as child processes
//!
//! The entry point is an executable speaking newline delimited JSON over its
//! standard streams:
//!
//! ```text
//! host → extension   {"type":"init","bundle":"clock","host_version":"0.1.0","info":{manifest}}
//!                    {"type":"event","id":1,"event":"tick","bundle":"clock","data":…}
//!                    {"type":"symbols","name":"core","symbols":{…}}
//!
//! extension → host   {"type":"ready","symbols":{…}}      entry point completed
//!                    {"type":"error","message":"…"}      entry point failed
//!                    {"type":"log","level":"info","message":"…"}
//!                    {"type":"send","event":"tick","bundle":"clock","data":…}
//!                    {"type":"listen","id":1,"event":"tick","bundle":"clock"}
//!                    {"type":"unlisten","id":1}
//!                    {"type":"toast","message":"…","level":"info","timeout":5}
//!                    {"type":"require","name":"core"}
//! ```
//!
//! After `ready` the process keeps being serviced until it exits; its
//! listeners are removed then.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

use super::api::{BundleApi, LogLevel};
use super::extension::{Extension, ExtensionLoader, Symbols};
use crate::error::{Result, bundle::extension_failed, bundle_load_failed};
use crate::manifest::Manifest;
use crate::relay::{ListenerHandle, ToastLevel};

/// Messages sent to the extension process
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage {
    Init {
        bundle: String,
        host_version: String,
        /// Manifest snapshot of the bundle
        info: Manifest,
    },
    Event {
        id: u64,
        event: String,
        bundle: String,
        data: Value,
    },
    Symbols {
        name: String,
        symbols: Symbols,
    },
}

/// Messages received from the extension process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtensionMessage {
    Ready {
        #[serde(default)]
        symbols: Option<Symbols>,
    },
    Error {
        message: String,
    },
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    Send {
        event: String,
        #[serde(default)]
        bundle: Option<String>,
        #[serde(default)]
        data: Value,
    },
    Listen {
        id: u64,
        event: String,
        #[serde(default)]
        bundle: Option<String>,
    },
    Unlisten {
        id: u64,
    },
    Toast {
        message: String,
        #[serde(default)]
        level: ToastLevel,
        /// Seconds
        #[serde(default)]
        timeout: Option<f64>,
    },
    Require {
        name: String,
    },
}

/// Loads extension entry points as executables
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    host_version: String,
}

impl ProcessLoader {
    pub fn new(host_version: impl Into<String>) -> Self {
        Self {
            host_version: host_version.into(),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[async_trait]
impl ExtensionLoader for ProcessLoader {
    async fn load(&self, manifest: &Manifest, entry: &Path) -> Result<Box<dyn Extension>> {
        if !is_executable(entry) {
            return Err(bundle_load_failed(
                &manifest.name,
                format!("extension entry point '{}' is not an executable file", entry.display()),
            ));
        }
        Ok(Box::new(ProcessExtension {
            bundle: manifest.name.clone(),
            entry: entry.to_path_buf(),
            workdir: manifest.location.clone(),
            host_version: self.host_version.clone(),
        }))
    }
}

/// An extension entry point that runs as a child process
#[derive(Debug)]
pub struct ProcessExtension {
    bundle: String,
    entry: PathBuf,
    workdir: PathBuf,
    host_version: String,
}

#[async_trait]
impl Extension for ProcessExtension {
    async fn main(self: Box<Self>, api: BundleApi) -> Result<Symbols> {
        let mut child = Command::new(&self.entry)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| extension_failed(&self.bundle, format!("failed to start: {e}")))?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(extension_failed(&self.bundle, "standard streams unavailable"));
        };

        let (outbox, mut queue) = mpsc::unbounded_channel::<HostMessage>();
        let writer_bundle = self.bundle.clone();
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let mut line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(bundle = %writer_bundle, "Failed to encode host message: {e}");
                        continue;
                    }
                };
                line.push('\n');
                if stdin.write_all(line.as_bytes()).await.is_err() || stdin.flush().await.is_err() {
                    break; // process exited
                }
            }
        });

        let _ = outbox.send(HostMessage::Init {
            bundle: self.bundle.clone(),
            host_version: self.host_version.clone(),
            info: api.bundle_info().clone(),
        });

        let mut session = Session {
            api,
            outbox,
            handles: HashMap::new(),
        };
        let mut lines = BufReader::new(stdout).lines();

        let symbols = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    let status = child.wait().await.map_or_else(|e| e.to_string(), |s| s.to_string());
                    session.close();
                    return Err(extension_failed(
                        &self.bundle,
                        format!("process exited before signalling ready ({status})"),
                    ));
                }
            };
            match session.decode(&line) {
                Some(ExtensionMessage::Ready { symbols }) => break symbols.unwrap_or_default(),
                Some(ExtensionMessage::Error { message }) => {
                    session.close();
                    return Err(extension_failed(&self.bundle, message));
                }
                Some(message) => session.apply(message),
                None => {}
            }
        };

        tokio::spawn(service(child, lines, session));
        Ok(symbols)
    }
}

/// Keep servicing a ready extension until its process exits
async fn service(mut child: Child, mut lines: Lines<BufReader<ChildStdout>>, mut session: Session) {
    while let Ok(Some(line)) = lines.next_line().await {
        match session.decode(&line) {
            Some(ExtensionMessage::Ready { .. } | ExtensionMessage::Error { .. }) => {
                session.api.log().warn("entry point already completed, ignoring message");
            }
            Some(message) => session.apply(message),
            None => {}
        }
    }

    match child.wait().await {
        Ok(status) => tracing::info!(bundle = %session.api.name(), %status, "Extension process exited"),
        Err(e) => tracing::error!(bundle = %session.api.name(), "Failed to reap extension process: {e}"),
    }
    session.close();
}

/// Host side state of one extension process
struct Session {
    api: BundleApi,
    outbox: mpsc::UnboundedSender<HostMessage>,
    /// Listener handles by the id the extension chose
    handles: HashMap<u64, ListenerHandle>,
}

impl Session {
    fn decode(&self, line: &str) -> Option<ExtensionMessage> {
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(message) => Some(message),
            Err(e) => {
                // not protocol, treat it as output
                self.api.log().info(&format!("{line} ({e})"));
                None
            }
        }
    }

    fn apply(&mut self, message: ExtensionMessage) {
        match message {
            ExtensionMessage::Log { level, message } => self.api.log().log(level, &message),
            ExtensionMessage::Send {
                event,
                bundle: Some(bundle),
                data,
            } => self.api.send_message_to_bundle(&event, &bundle, data),
            ExtensionMessage::Send {
                event,
                bundle: None,
                data,
            } => self.api.send_message(&event, data),
            ExtensionMessage::Listen { id, event, bundle } => self.listen(id, event, bundle),
            ExtensionMessage::Unlisten { id } => match self.handles.remove(&id) {
                Some(handle) => match handle.unlisten() {
                    Ok(()) => tracing::debug!(
                        bundle = %self.api.name(),
                        event = handle.event(),
                        target = handle.bundle(),
                        "Extension stopped listening"
                    ),
                    Err(e) => self.api.log().warn(&e.to_string()),
                },
                None => self.api.log().warn(&format!("unlisten for unknown listener {id}")),
            },
            ExtensionMessage::Toast {
                message,
                level,
                timeout,
            } => {
                let timeout = timeout.and_then(|secs| Duration::try_from_secs_f64(secs).ok());
                self.api.toast(&message, level, timeout);
            }
            ExtensionMessage::Require { name } => {
                let symbols = self.api.require(&name);
                let _ = self.outbox.send(HostMessage::Symbols { name, symbols });
            }
            ExtensionMessage::Ready { .. } | ExtensionMessage::Error { .. } => {}
        }
    }

    fn listen(&mut self, id: u64, event: String, bundle: Option<String>) {
        if self.handles.contains_key(&id) {
            self.api.log().warn(&format!("listener id {id} is already in use"));
            return;
        }
        let target = bundle.unwrap_or_else(|| self.api.name().to_string());
        let outbox = self.outbox.clone();
        let (forward_event, forward_bundle) = (event.clone(), target.clone());
        let handle = self.api.listen_for(
            &event,
            Some(&target),
            Arc::new(move |data: &Value| {
                let _ = outbox.send(HostMessage::Event {
                    id,
                    event: forward_event.clone(),
                    bundle: forward_bundle.clone(),
                    data: data.clone(),
                });
            }),
        );
        self.handles.insert(id, handle);
    }

    /// Drop every listener of this extension
    fn close(&mut self) {
        self.handles.clear();
        let removed = self.api.relay().remove_listeners_of(self.api.name());
        if removed > 0 {
            tracing::debug!(bundle = %self.api.name(), removed, "Removed extension listeners");
        }
    }
}
