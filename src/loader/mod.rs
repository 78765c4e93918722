//! Bundle loading
//!
//! Loads the resolved graph strictly sequentially in planned order.
//!
//! ## Per bundle
//!
//! 1. Every dependency must already have loaded; otherwise the bundle fails
//!    with "dependency X did not load" and its dependents fail the same way
//! 2. Asset folders and files are validated before any extension code runs
//! 3. The extension entry point, if declared, is loaded through the injected
//!    [`ExtensionLoader`] and run with a bundle scoped [`BundleApi`] under the
//!    load timeout
//! 4. Exported symbols are stored for later `require` calls
//!
//! A failure only affects its bundle (and, through step 1, its dependents).
//! A dependency cycle aborts the whole load.
//!
//! ## Modules
//!
//! - [`api`]: The capability object handed to extensions
//! - [`assets`]: Asset validation and content routes
//! - [`extension`]: The extension loading seam
//! - [`process`]: Extensions as child processes

pub mod api;
pub mod assets;
pub mod extension;
pub mod process;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub use api::{BundleApi, SymbolTable};
pub use assets::{AssetCategory, AssetRoute, BundleAssets, validate_assets};
pub use extension::{ExtensionLoader, Symbols};
pub use process::ProcessLoader;

use crate::error::{OmphalosError, Result, bundle_load_failed};
use crate::manifest::Manifest;
use crate::relay::Relay;
use crate::resolver::{DependencyGraph, plan};

/// A bundle that loaded, with its content routes
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub manifest: Arc<Manifest>,
    pub assets: BundleAssets,
}

/// A bundle that failed to load
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: OmphalosError,
}

/// Outcome of loading the graph
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded bundles, in load order
    pub loaded: Vec<LoadedBundle>,
    pub failed: Vec<LoadFailure>,
    pub symbols: SymbolTable,
}

/// Orchestrates loading of a resolved bundle graph
pub struct BundleLoader {
    extensions: Arc<dyn ExtensionLoader>,
    relay: Relay,
    timeout: Duration,
}

impl BundleLoader {
    pub fn new(extensions: Arc<dyn ExtensionLoader>, relay: Relay, timeout: Duration) -> Self {
        Self {
            extensions,
            relay,
            timeout,
        }
    }

    /// Load every bundle of the graph in dependency order
    ///
    /// # Errors
    ///
    /// Returns `CircularDependency` if the graph has a cycle. Per bundle
    /// failures are reported in [`LoadReport::failed`].
    pub async fn load_all(&self, graph: &DependencyGraph) -> Result<LoadReport> {
        let order = plan(graph)?;
        tracing::debug!(bundles = graph.len(), "Loading bundles in dependency order");
        let mut report = LoadReport::default();
        let mut loaded: HashSet<String> = HashSet::new();

        for index in order.iter() {
            let Some(node) = graph.node(index) else {
                continue;
            };
            let manifest = Arc::clone(&node.manifest);

            let missing = node
                .dependencies
                .iter()
                .filter_map(|&dep| graph.node(dep))
                .map(|dep| dep.manifest.name.as_str())
                .find(|dep| !loaded.contains(*dep));
            let result = match missing {
                Some(dep) => Err(bundle_load_failed(
                    &manifest.name,
                    format!("dependency '{dep}' did not load"),
                )),
                None => self.load_one(&manifest, &report.symbols).await,
            };

            match result {
                Ok(assets) => {
                    tracing::info!(
                        bundle = %manifest.name,
                        version = %manifest.version,
                        routes = assets.route_count(),
                        "Loaded bundle"
                    );
                    loaded.insert(manifest.name.clone());
                    report.loaded.push(LoadedBundle { manifest, assets });
                }
                Err(error) => {
                    if error.is_expected() {
                        tracing::warn!(bundle = %manifest.name, "{error}");
                    } else {
                        tracing::error!(bundle = %manifest.name, error = ?error, "Bundle failed to load");
                    }
                    // listeners registered before the failure
                    self.relay.remove_listeners_of(&manifest.name);
                    report.failed.push(LoadFailure {
                        name: manifest.name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn load_one(&self, manifest: &Arc<Manifest>, symbols: &SymbolTable) -> Result<BundleAssets> {
        let assets = validate_assets(manifest)?;

        let exported = match manifest.extension_path() {
            Some(entry) => {
                if !entry.is_file() {
                    return Err(bundle_load_failed(
                        &manifest.name,
                        format!("extension entry point '{}' does not exist", entry.display()),
                    ));
                }
                let extension = self.extensions.load(manifest, &entry).await?;
                let api = BundleApi::new(Arc::clone(manifest), self.relay.clone(), symbols.clone());
                tracing::debug!(bundle = %manifest.name, entry = %entry.display(), "Running extension");
                match tokio::time::timeout(self.timeout, extension.main(api)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(OmphalosError::ExtensionTimeout {
                            bundle: manifest.name.clone(),
                            seconds: self.timeout.as_secs(),
                        });
                    }
                }
            }
            None => Symbols::new(),
        };
        symbols.insert(&manifest.name, exported);

        if let Some(graphics) = &assets.graphics {
            for route in graphics.routes.iter().filter(|r| r.single_instance) {
                self.relay
                    .register_single_instance(&manifest.name, &route.file);
            }
        }

        Ok(assets)
    }
}
