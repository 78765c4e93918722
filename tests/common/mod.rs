//! Common test utilities for Omphalos integration tests

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// A host root directory for integration tests
pub struct TestRoot {
    /// Temporary directory
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Path to the root
    pub path: PathBuf,
}

impl TestRoot {
    /// Create a new, empty root
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Write a file relative to the root
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Create `bundles/<name>/package.json` with the given dependencies
    #[allow(dead_code)]
    pub fn create_bundle(&self, name: &str, version: &str, deps: &[(&str, &str)]) {
        self.create_bundle_with(name, version, "*", deps);
    }

    /// Like [`TestRoot::create_bundle`] with an explicit host version range
    #[allow(dead_code)]
    pub fn create_bundle_with(&self, name: &str, version: &str, range: &str, deps: &[(&str, &str)]) {
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|(dep, req)| ((*dep).to_string(), serde_json::Value::from(*req)))
            .collect();
        let package = serde_json::json!({
            "name": name,
            "version": version,
            "omphalos": { "compatibleRange": range, "deps": deps }
        });
        self.write_file(
            &format!("bundles/{name}/package.json"),
            &serde_json::to_string_pretty(&package).expect("Failed to serialize package"),
        );
    }

    /// The omphalos binary, run from this root with a clean environment
    pub fn cmd(&self) -> Command {
        let mut cmd = omphalos_cmd();
        cmd.current_dir(&self.path)
            .env_remove("OMPHALOS_ROOT")
            .env_remove("OMPHALOS_CONFIG")
            .env_remove("PORT")
            .env_remove("LOG_LEVEL")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.path.join(".xdg"));
        cmd
    }
}

// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
pub fn omphalos_cmd() -> Command {
    Command::cargo_bin("omphalos").expect("omphalos binary is built")
}
