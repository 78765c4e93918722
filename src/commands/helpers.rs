//! Command helper utilities

use std::path::{Path, PathBuf};

use semver::Version;

use crate::config::{HostConfig, Overrides};
use crate::discovery::DiscoveryOptions;
use crate::error::{OmphalosError, Result, config_invalid};

/// Resolve the root path from the optional argument
///
/// If a root is provided, use it. Otherwise, resolve to the current directory.
pub fn resolve_root_path(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => std::env::current_dir().map_err(|e| OmphalosError::IoError {
            message: format!("Failed to get current directory: {e}"),
        }),
    }
}

/// Root directory and the configuration that applies to it
pub struct Context {
    pub root: PathBuf,
    pub config: HostConfig,
}

impl Context {
    pub fn load(root: Option<PathBuf>, config: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let root = resolve_root_path(root)?;
        let config = HostConfig::load(&root, config, overrides)?;
        Ok(Self { root, config })
    }

    pub fn discovery_options(&self) -> Result<DiscoveryOptions> {
        Ok(DiscoveryOptions {
            primary_dir: self.config.bundles_dir(&self.root),
            extra_paths: self.config.extra_paths(&self.root),
            install_root: self.root.clone(),
            ignore: self.config.bundles.ignore.clone(),
            host_version: host_version()?,
        })
    }
}

/// Version of this host, checked against each bundle's compatibleRange
pub fn host_version() -> Result<Version> {
    Version::parse(env!("CARGO_PKG_VERSION"))
        .map_err(|e| config_invalid(format!("host version is not semver: {e}")))
}
