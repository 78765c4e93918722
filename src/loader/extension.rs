//! Extension loading seam
//!
//! The orchestrator never runs extension code itself. It asks an injected
//! [`ExtensionLoader`] for the entry point of a bundle and invokes it with
//! the bundle's [`BundleApi`]. Production uses the process loader; tests use
//! in-memory implementations.

use std::path::Path;

use async_trait::async_trait;

use super::api::BundleApi;
use crate::error::Result;
use crate::manifest::Manifest;

/// Values an extension exports for bundles that `require` it
pub type Symbols = serde_json::Map<String, serde_json::Value>;

/// Resolves a bundle's extension entry point
#[async_trait]
pub trait ExtensionLoader: Send + Sync {
    /// Load the entry point at `entry`
    ///
    /// # Errors
    ///
    /// Returns `BundleLoad` when the entry point is missing or unusable.
    async fn load(&self, manifest: &Manifest, entry: &Path) -> Result<Box<dyn Extension>>;
}

/// A loaded entry point, invoked once
#[async_trait]
pub trait Extension: Send {
    /// Run the entry point to completion and return its exported symbols
    async fn main(self: Box<Self>, api: BundleApi) -> Result<Symbols>;
}
