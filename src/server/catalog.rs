//! Read-only view of the loaded bundles for the dashboard API

use serde::Serialize;

use crate::discovery::Rejection;
use crate::loader::{LoadFailure, LoadedBundle};
use crate::manifest::Size;
use crate::resolver::Exclusion;

/// Loaded bundles, in load order, and the ones that did not load
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    bundles: Vec<LoadedBundle>,
    failed: Vec<FailedBundle>,
}

/// A bundle that was found but not loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBundle {
    /// Bundle name, or the directory when the descriptor had none
    pub name: String,
    pub reason: String,
}

impl From<Rejection> for FailedBundle {
    fn from(rejection: Rejection) -> Self {
        Self {
            name: rejection
                .name
                .unwrap_or_else(|| rejection.location.display().to_string()),
            reason: rejection.error.to_string(),
        }
    }
}

impl From<Exclusion> for FailedBundle {
    fn from(exclusion: Exclusion) -> Self {
        Self {
            name: exclusion.manifest.name,
            reason: exclusion.error.to_string(),
        }
    }
}

impl From<LoadFailure> for FailedBundle {
    fn from(failure: LoadFailure) -> Self {
        Self {
            name: failure.name,
            reason: failure.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSummary {
    pub name: String,
    pub version: String,
    pub extension: bool,
    pub panels: usize,
    pub graphics: usize,
}

/// A panel in the shape the dashboard lays out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelEntry {
    pub bundle: String,
    pub title: String,
    /// Declared file
    pub content: String,
    pub url: Option<String>,
    pub name: String,
    pub locked: bool,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub fullbleed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphicEntry {
    pub file: String,
    pub url: Option<String>,
    pub size: Size,
    pub single_instance: bool,
}

/// Graphics of one bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphicGroup {
    pub name: String,
    pub graphics: Vec<GraphicEntry>,
}

impl Catalog {
    pub fn new(bundles: Vec<LoadedBundle>) -> Self {
        Self {
            bundles,
            failed: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_failures(mut self, failed: impl IntoIterator<Item = FailedBundle>) -> Self {
        self.failed.extend(failed);
        self
    }

    /// Bundles that were rejected, excluded or failed to load
    pub fn failed(&self) -> &[FailedBundle] {
        &self.failed
    }

    pub fn bundles(&self) -> &[LoadedBundle] {
        &self.bundles
    }

    pub fn summaries(&self) -> Vec<BundleSummary> {
        self.bundles
            .iter()
            .map(|b| BundleSummary {
                name: b.manifest.name.clone(),
                version: b.manifest.version.to_string(),
                extension: b.manifest.extension.is_some(),
                panels: b.manifest.panels.len(),
                graphics: b.manifest.graphics.len(),
            })
            .collect()
    }

    /// Every panel of every loaded bundle
    pub fn panels(&self) -> Vec<PanelEntry> {
        self.bundles
            .iter()
            .flat_map(|bundle| {
                bundle.manifest.panels.iter().map(move |panel| PanelEntry {
                    bundle: bundle.manifest.name.clone(),
                    title: panel.title.clone(),
                    content: panel.file.clone(),
                    url: url_of(bundle, &panel.file, false),
                    name: panel.name.clone(),
                    locked: panel.locked,
                    width: panel.size.width,
                    height: panel.size.height,
                    min_width: panel.min_size.map(|s| s.width),
                    min_height: panel.min_size.map(|s| s.height),
                    max_width: panel.max_size.map(|s| s.width),
                    max_height: panel.max_size.map(|s| s.height),
                    workspace: panel.workspace.clone(),
                    fullbleed: panel.fullbleed,
                })
            })
            .collect()
    }

    /// Graphics grouped by bundle, sorted by bundle name
    pub fn graphics(&self) -> Vec<GraphicGroup> {
        let mut groups: Vec<GraphicGroup> = self
            .bundles
            .iter()
            .filter(|b| !b.manifest.graphics.is_empty())
            .map(|bundle| GraphicGroup {
                name: bundle.manifest.name.clone(),
                graphics: bundle
                    .manifest
                    .graphics
                    .iter()
                    .map(|g| GraphicEntry {
                        file: g.file.clone(),
                        url: url_of(bundle, &g.file, true),
                        size: g.size,
                        single_instance: g.single_instance,
                    })
                    .collect(),
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }
}

/// URL of a routed asset; `None` for assets that were rejected
fn url_of(bundle: &LoadedBundle, file: &str, graphic: bool) -> Option<String> {
    let category = if graphic {
        bundle.assets.graphics.as_ref()
    } else {
        bundle.assets.panels.as_ref()
    };
    category?
        .routes
        .iter()
        .find(|r| r.file == file)
        .map(|r| r.url_path.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::loader::validate_assets;
    use crate::manifest::validate;
    use crate::test_fixtures::{create_temp_dir, package, write_bundle, write_file};
    use serde_json::json;
    use std::sync::Arc;

    fn loaded(root: &std::path::Path, name: &str, section: serde_json::Value) -> LoadedBundle {
        let raw = package(name, "1.0.0", section);
        let dir = write_bundle(root, name, &raw);
        write_file(&dir, "panels/.keep", "");
        write_file(&dir, "graphics/.keep", "");
        let manifest = validate(&raw, &dir).unwrap();
        let assets = validate_assets(&manifest).unwrap();
        LoadedBundle {
            manifest: Arc::new(manifest),
            assets,
        }
    }

    #[test]
    fn test_panels_shape() {
        let temp = create_temp_dir();
        let catalog = Catalog::new(vec![loaded(
            temp.path(),
            "scores",
            json!({
                "panels": [{
                    "file": "control.html", "name": "control", "title": "Scores",
                    "size": { "width": 4, "height": 2 },
                    "minSize": { "width": 2, "height": 1 }
                }]
            }),
        )]);

        let value = serde_json::to_value(catalog.panels()).unwrap();
        assert_eq!(
            value,
            json!([{
                "bundle": "scores",
                "title": "Scores",
                "content": "control.html",
                "url": "/bundles/scores/panels/control.html",
                "name": "control",
                "locked": false,
                "width": 4,
                "height": 2,
                "minWidth": 2,
                "minHeight": 1,
                "fullbleed": false
            }])
        );
    }

    #[test]
    fn test_graphics_grouped_and_sorted() {
        let temp = create_temp_dir();
        let graphic = |file: &str| json!({ "file": file, "size": { "width": 1920, "height": 1080 } });
        let catalog = Catalog::new(vec![
            loaded(temp.path(), "zeta", json!({ "graphics": [graphic("z.html")] })),
            loaded(temp.path(), "plain", json!({})),
            loaded(temp.path(), "alpha", json!({ "graphics": [graphic("a.html"), graphic("b.html")] })),
        ]);

        let groups = catalog.graphics();
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(groups[0].graphics.len(), 2);
        assert_eq!(
            groups[0].graphics[0].url.as_deref(),
            Some("/bundles/alpha/graphics/a.html")
        );
    }

    #[test]
    fn test_failures_keep_reason() {
        let failure = LoadFailure {
            name: "scores".to_string(),
            error: crate::error::bundle_load_failed("scores", "dependency 'core' did not load"),
        };
        let catalog = Catalog::default().with_failures([FailedBundle::from(failure)]);
        assert_eq!(catalog.failed().len(), 1);
        assert_eq!(catalog.failed()[0].name, "scores");
        assert!(catalog.failed()[0].reason.contains("dependency 'core' did not load"));
    }

    #[test]
    fn test_summaries() {
        let temp = create_temp_dir();
        let catalog = Catalog::new(vec![loaded(temp.path(), "plain", json!({}))]);
        assert_eq!(
            catalog.summaries(),
            vec![BundleSummary {
                name: "plain".to_string(),
                version: "1.0.0".to_string(),
                extension: false,
                panels: 0,
                graphics: 0,
            }]
        );
    }
}
