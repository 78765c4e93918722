//! Test fixtures and utilities for reducing test setup duplication.
//!
//! Bundle tests need either a bundle directory on disk (discovery, asset
//! validation) or an in-memory manifest (resolver, planner, loader). Both are
//! a single call here:
//!
//! ```ignore
//! use crate::test_fixtures::{create_temp_dir, write_bundle, manifest};
//!
//! let temp = create_temp_dir();
//! write_bundle(temp.path(), "clock", &package("clock", "1.0.0", json!({})));
//!
//! let b = manifest("b", "1.0.0", &[("a", "^1.0")]);
//! ```

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::manifest::{MANIFEST_FILE, Manifest, validate};

/// Create a temp directory in the system temp location.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("omphalos-")
        .tempdir()
        .expect("Failed to create temp directory")
}

/// Build a package descriptor with a bundle section.
///
/// `section` is merged over a default section that accepts any host version.
#[must_use]
pub fn package(name: &str, version: &str, section: Value) -> Value {
    let mut bundle = json!({ "compatibleRange": "*" });
    if let (Some(target), Value::Object(extra)) = (bundle.as_object_mut(), section) {
        target.extend(extra);
    }
    json!({ "name": name, "version": version, "omphalos": bundle })
}

/// Write `package` as the descriptor of bundle directory `root/dir`.
///
/// # Panics
///
/// Panics if the directory or file cannot be written.
pub fn write_bundle(root: &Path, dir: &str, package: &Value) -> PathBuf {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).expect("Failed to create bundle directory");
    let content = serde_json::to_string_pretty(package).expect("Failed to serialize package");
    std::fs::write(path.join(MANIFEST_FILE), content).expect("Failed to write package.json");
    path
}

/// Write a file relative to a bundle directory, creating parents.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_file(bundle_dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = bundle_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    path
}

/// Build a validated in-memory manifest with the given dependencies.
///
/// The manifest is located at `/bundles/<name>`, which does not exist.
///
/// # Panics
///
/// Panics if the generated descriptor does not validate.
#[must_use]
pub fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> Manifest {
    let deps: serde_json::Map<String, Value> = deps
        .iter()
        .map(|(dep, range)| ((*dep).to_string(), Value::String((*range).to_string())))
        .collect();
    let raw = package(name, version, json!({ "deps": deps }));
    validate(&raw, &Path::new("/bundles").join(name)).expect("fixture manifest should validate")
}
