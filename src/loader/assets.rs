//! Asset validation and content routes
//!
//! For every category a bundle declares assets in, the category folder must
//! exist. Each declared file becomes a route under
//! `/bundles/<bundle>/<folder>/<file>`:
//!
//! - files escaping the folder, or containing route syntax, are rejected and
//!   not routed
//! - missing files are routed anyway and answered with a "missing asset" page

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, bundle_load_failed};
use crate::manifest::{AssetKind, Manifest};
use crate::path_utils::{has_route_meta_chars, resolve_within, to_forward_slashes};

/// URL prefix under which bundle content is served
pub const BUNDLES_ROUTE: &str = "/bundles";

/// A declared asset and where it is served
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRoute {
    /// File as declared, relative to the category folder
    pub file: String,
    pub url_path: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub exists: bool,
    pub single_instance: bool,
}

/// The validated assets of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCategory {
    pub kind: AssetKind,
    /// Absolute category folder, also served as a static mount
    pub root: PathBuf,
    pub routes: Vec<AssetRoute>,
}

impl AssetCategory {
    /// URL prefix of the category, `/bundles/<bundle>/<folder>`
    pub fn url_prefix(bundle: &str, kind: AssetKind) -> String {
        format!("{BUNDLES_ROUTE}/{bundle}/{}", kind.folder())
    }
}

/// Content routes of a loaded bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleAssets {
    pub panels: Option<AssetCategory>,
    pub graphics: Option<AssetCategory>,
}

impl BundleAssets {
    pub fn categories(&self) -> impl Iterator<Item = &AssetCategory> {
        self.panels.iter().chain(self.graphics.iter())
    }

    pub fn route_count(&self) -> usize {
        self.categories().map(|c| c.routes.len()).sum()
    }
}

/// Validate the asset folders and files of a bundle
///
/// # Errors
///
/// Returns `BundleLoad` when a category with declared assets has no folder.
pub fn validate_assets(manifest: &Manifest) -> Result<BundleAssets> {
    Ok(BundleAssets {
        panels: validate_category(manifest, AssetKind::Panel)?,
        graphics: validate_category(manifest, AssetKind::Graphic)?,
    })
}

fn validate_category(manifest: &Manifest, kind: AssetKind) -> Result<Option<AssetCategory>> {
    let files = manifest.asset_files(kind);
    if files.is_empty() {
        return Ok(None);
    }

    let root = manifest.location.join(kind.folder());
    if !root.is_dir() {
        return Err(bundle_load_failed(
            &manifest.name,
            format!("bundle declares {} but has no '{}' folder", kind.folder(), kind.folder()),
        ));
    }

    let prefix = AssetCategory::url_prefix(&manifest.name, kind);
    let routes = files
        .into_iter()
        .filter_map(|file| route(manifest, kind, &root, &prefix, file))
        .collect();

    Ok(Some(AssetCategory { kind, root, routes }))
}

fn route(manifest: &Manifest, kind: AssetKind, root: &Path, prefix: &str, file: &str) -> Option<AssetRoute> {
    if has_route_meta_chars(file) {
        tracing::error!(bundle = %manifest.name, file, "Asset path contains route syntax, not serving it");
        return None;
    }
    let Some(path) = resolve_within(root, file) else {
        tracing::error!(
            bundle = %manifest.name,
            file,
            "Asset path escapes the {} folder, not serving it",
            kind.folder()
        );
        return None;
    };

    let exists = path.is_file();
    if !exists {
        tracing::warn!(bundle = %manifest.name, file, "Declared asset does not exist");
    }

    let relative = to_forward_slashes(Path::new(file));
    let relative = relative.trim_start_matches("./");
    Some(AssetRoute {
        file: file.to_string(),
        url_path: format!("{prefix}/{relative}"),
        path,
        exists,
        single_instance: kind == AssetKind::Graphic && manifest.is_single_instance(file),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::OmphalosError;
    use crate::manifest::validate;
    use crate::test_fixtures::{create_temp_dir, package, write_bundle, write_file};
    use serde_json::json;

    fn load(dir: &Path) -> Manifest {
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("package.json")).unwrap()).unwrap();
        validate(&raw, dir).unwrap()
    }

    #[test]
    fn test_no_declared_assets_needs_no_folders() {
        let temp = create_temp_dir();
        let dir = write_bundle(temp.path(), "bare", &package("bare", "1.0.0", json!({})));
        let assets = validate_assets(&load(&dir)).unwrap();
        assert_eq!(assets, BundleAssets::default());
    }

    #[test]
    fn test_missing_category_folder_fails() {
        let temp = create_temp_dir();
        let dir = write_bundle(
            temp.path(),
            "clock",
            &package(
                "clock",
                "1.0.0",
                json!({ "graphics": [{ "file": "clock.html", "size": { "width": 1, "height": 1 } }] }),
            ),
        );
        let err = validate_assets(&load(&dir)).unwrap_err();
        assert!(matches!(err, OmphalosError::BundleLoad { .. }));
        assert!(err.to_string().contains("graphics"));
    }

    #[test]
    fn test_routes_for_declared_files() {
        let temp = create_temp_dir();
        let dir = write_bundle(
            temp.path(),
            "clock",
            &package(
                "clock",
                "1.0.0",
                json!({
                    "panels": [{ "file": "control.html", "name": "control", "title": "Clock",
                                 "size": { "width": 2, "height": 2 } }],
                    "graphics": [
                        { "file": "clock.html", "size": { "width": 1, "height": 1 }, "singleInstance": true },
                        { "file": "gone.html", "size": { "width": 1, "height": 1 } },
                        { "file": "../../etc/passwd", "size": { "width": 1, "height": 1 } },
                        { "file": "a:b.html", "size": { "width": 1, "height": 1 } }
                    ]
                }),
            ),
        );
        write_file(&dir, "panels/control.html", "<p>control</p>");
        write_file(&dir, "graphics/clock.html", "<p>clock</p>");

        let assets = validate_assets(&load(&dir)).unwrap();

        let panels = assets.panels.as_ref().unwrap();
        assert_eq!(panels.routes[0].url_path, "/bundles/clock/panels/control.html");
        assert!(panels.routes[0].exists);

        let graphics = assets.graphics.as_ref().unwrap();
        let files: Vec<_> = graphics.routes.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["clock.html", "gone.html"]);
        assert!(graphics.routes[0].single_instance);
        assert!(graphics.routes[0].exists);
        assert!(!graphics.routes[1].exists);
        assert!(!graphics.routes[1].single_instance);
        assert_eq!(assets.route_count(), 3);
    }
}
