//! Bundle manifests
//!
//! A bundle is a directory holding a `package.json` whose `omphalos` section
//! describes how the host should load it:
//!
//! ```text
//! {
//!   "name": "clock", "version": "1.2.0",
//!   "omphalos": {
//!     "compatibleRange": "^0.1",
//!     "deps": { "timers": "^1.0" },
//!     "extension": "server/extension",
//!     "panels": [ { "file": "control.html", "name": "control", "title": "Clock",
//!                   "size": { "width": 4, "height": 2 } } ],
//!     "graphics": [ { "file": "clock.html", "size": { "width": 1920, "height": 1080 } } ]
//!   }
//! }
//! ```
//!
//! Manifests are rebuilt from disk on every start and never persisted.

pub mod jsonc;
pub mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;

use semver::{Version, VersionReq};
use serde::Serialize;

#[cfg(test)]
pub use schema::validate;
pub use schema::{validate_bundle_section, validate_package};

/// Descriptor file every bundle directory must contain
pub const MANIFEST_FILE: &str = "package.json";

/// Key of the bundle specific section inside the descriptor
pub const BUNDLE_SECTION: &str = "omphalos";

/// Width and height of an asset; columns/rows for panels, pixels for graphics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// A dashboard panel contributed by a bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDescriptor {
    pub file: String,
    pub name: String,
    pub title: String,
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<Size>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub fullbleed: bool,
}

/// A stream overlay graphic contributed by a bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphicDescriptor {
    pub file: String,
    pub size: Size,
    /// Only one live viewer may display this graphic at a time
    pub single_instance: bool,
}

/// The two kinds of servable assets a bundle can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Panel,
    Graphic,
}

impl AssetKind {
    /// Folder inside the bundle that holds assets of this kind
    pub fn folder(self) -> &'static str {
        match self {
            AssetKind::Panel => "panels",
            AssetKind::Graphic => "graphics",
        }
    }
}

/// A validated bundle manifest
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub version: Version,
    pub compatible_range: VersionReq,
    /// Declared dependencies, dependency name to required range
    pub dependencies: BTreeMap<String, VersionReq>,
    /// Extension entry point, relative to the bundle directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<PathBuf>,
    pub panels: Vec<PanelDescriptor>,
    pub graphics: Vec<GraphicDescriptor>,
    /// Absolute path of the bundle directory
    pub location: PathBuf,
    #[serde(skip)]
    pub duplicate: bool,
}

impl Manifest {
    /// Files declared for one asset kind, in declaration order
    pub fn asset_files(&self, kind: AssetKind) -> Vec<&str> {
        match kind {
            AssetKind::Panel => self.panels.iter().map(|p| p.file.as_str()).collect(),
            AssetKind::Graphic => self.graphics.iter().map(|g| g.file.as_str()).collect(),
        }
    }

    /// Whether the declared graphic `file` is single instance
    pub fn is_single_instance(&self, file: &str) -> bool {
        self.graphics
            .iter()
            .any(|g| g.file == file && g.single_instance)
    }

    /// Absolute path of the extension entry point, if one is declared
    pub fn extension_path(&self) -> Option<PathBuf> {
        self.extension.as_ref().map(|rel| self.location.join(rel))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn sample() -> Manifest {
        let raw = json!({
            "name": "clock",
            "version": "1.2.0",
            "omphalos": {
                "compatibleRange": "*",
                "extension": "server/ext",
                "panels": [
                    { "file": "control.html", "name": "control", "title": "Clock",
                      "size": { "width": 4, "height": 2 } }
                ],
                "graphics": [
                    { "file": "clock.html", "size": { "width": 1920, "height": 1080 },
                      "singleInstance": true },
                    { "file": "lower.html", "size": { "width": 1920, "height": 200 } }
                ]
            }
        });
        validate(&raw, Path::new("/bundles/clock")).unwrap()
    }

    #[test]
    fn test_asset_files_by_kind() {
        let manifest = sample();
        assert_eq!(manifest.asset_files(AssetKind::Panel), vec!["control.html"]);
        assert_eq!(
            manifest.asset_files(AssetKind::Graphic),
            vec!["clock.html", "lower.html"]
        );
    }

    #[test]
    fn test_single_instance_lookup() {
        let manifest = sample();
        assert!(manifest.is_single_instance("clock.html"));
        assert!(!manifest.is_single_instance("lower.html"));
        assert!(!manifest.is_single_instance("missing.html"));
    }

    #[test]
    fn test_extension_path_is_absolute() {
        let manifest = sample();
        assert_eq!(
            manifest.extension_path(),
            Some(PathBuf::from("/bundles/clock/server/ext"))
        );
    }
}
