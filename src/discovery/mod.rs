//! Bundle discovery
//!
//! Scans the bundles directory and any extra paths for bundle folders,
//! validates each descriptor and checks host compatibility.
//!
//! ## Pipeline
//!
//! ```text
//! candidate dir ─► read package.json ─► strip comments ─► parse
//!               ─► validate_package ─► ignore list ─► validate_bundle_section
//!               ─► host compatibility ─► duplicate names
//! ```
//!
//! Every failure is isolated to its candidate: it is logged, recorded as a
//! [`Rejection`] and the scan continues.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use semver::Version;
use walkdir::WalkDir;
use wax::{CandidatePath, Glob, Pattern};

use crate::error::{OmphalosError, Result, file_read_failed, schema_error};
use crate::manifest::{MANIFEST_FILE, Manifest, jsonc, validate_bundle_section, validate_package};

/// Inputs of a discovery scan
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Directory whose immediate subdirectories are candidate bundles
    pub primary_dir: PathBuf,
    /// Additional bundle directories, absolute or relative to `install_root`
    pub extra_paths: Vec<PathBuf>,
    pub install_root: PathBuf,
    /// Glob patterns of bundle names to skip
    pub ignore: Vec<String>,
    pub host_version: Version,
}

/// A candidate that did not make it into the accepted set
#[derive(Debug)]
pub struct Rejection {
    pub location: PathBuf,
    /// Bundle name, when the descriptor got far enough to have one
    pub name: Option<String>,
    pub error: OmphalosError,
}

/// Result of a discovery scan
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub accepted: Vec<Manifest>,
    pub rejected: Vec<Rejection>,
}

/// Discover, validate and deduplicate bundles
pub fn discover(options: &DiscoveryOptions) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    let mut candidates = list_primary_candidates(&options.primary_dir);
    candidates.extend(resolve_extra_paths(&options.extra_paths, &options.install_root));

    let mut seen = HashSet::new();
    for dir in candidates {
        let location = dunce::canonicalize(&dir).unwrap_or(dir);
        if !seen.insert(location.clone()) {
            tracing::debug!(location = %location.display(), "Bundle directory listed twice, scanning it once");
            continue;
        }
        match load_candidate(&location, options) {
            Ok(Some(manifest)) => {
                tracing::debug!(bundle = %manifest.name, location = %location.display(), "Discovered bundle");
                report.accepted.push(manifest);
            }
            Ok(None) => {}
            Err((name, error)) => {
                tracing::warn!(location = %location.display(), "Skipping bundle: {error}");
                report.rejected.push(Rejection {
                    location,
                    name,
                    error,
                });
            }
        }
    }

    reject_duplicates(&mut report);
    report
}

/// Immediate subdirectories of `dir` holding a descriptor, sorted by name
fn list_primary_candidates(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "Bundles directory does not exist");
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.join(MANIFEST_FILE).is_file())
        .collect()
}

fn resolve_extra_paths(extra_paths: &[PathBuf], install_root: &Path) -> Vec<PathBuf> {
    extra_paths
        .iter()
        .filter_map(|path| {
            let full = if path.is_absolute() {
                path.clone()
            } else {
                install_root.join(path)
            };
            if full.join(MANIFEST_FILE).is_file() {
                Some(full)
            } else {
                tracing::warn!(
                    path = %full.display(),
                    "Extra bundle path has no {MANIFEST_FILE}, ignoring it"
                );
                None
            }
        })
        .collect()
}

/// Whether `name` matches any ignore pattern
///
/// Patterns that are not valid globs fall back to an exact comparison.
pub fn is_ignored(name: &str, patterns: &[String]) -> bool {
    let candidate = CandidatePath::from(name);
    patterns.iter().any(|pattern| match Glob::new(pattern) {
        Ok(glob) => glob.matched(&candidate).is_some(),
        Err(_) => pattern == name,
    })
}

type CandidateError = (Option<String>, OmphalosError);

/// Load one candidate; `Ok(None)` means it was ignored
fn load_candidate(
    location: &Path,
    options: &DiscoveryOptions,
) -> std::result::Result<Option<Manifest>, CandidateError> {
    let raw = read_descriptor(location).map_err(|e| (None, e))?;
    let package = validate_package(&raw, location).map_err(|e| (None, e))?;
    let name = package.name.clone();

    if is_ignored(&name, &options.ignore) {
        tracing::debug!(bundle = %name, "Bundle is in the ignore list, skipping");
        return Ok(None);
    }

    let manifest =
        validate_bundle_section(package, &raw, location).map_err(|e| (Some(name.clone()), e))?;

    if !manifest.compatible_range.matches(&options.host_version) {
        return Err((
            Some(name.clone()),
            OmphalosError::IncompatibleHost {
                name,
                range: manifest.compatible_range.to_string(),
                host: options.host_version.to_string(),
            },
        ));
    }

    Ok(Some(manifest))
}

fn read_descriptor(location: &Path) -> Result<serde_json::Value> {
    let path = location.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| file_read_failed(path.display().to_string(), e.to_string()))?;
    jsonc::parse(&content)
        .map_err(|e| schema_error(path.display().to_string(), vec![format!("(root): invalid JSON ({e})")]))
}

/// Flag and reject every manifest whose name is shared with another
fn reject_duplicates(report: &mut DiscoveryReport) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for manifest in &report.accepted {
        *counts.entry(manifest.name.clone()).or_default() += 1;
    }

    let (duplicates, unique): (Vec<Manifest>, Vec<Manifest>) = std::mem::take(&mut report.accepted)
        .into_iter()
        .partition(|manifest| counts.get(&manifest.name).copied().unwrap_or(0) > 1);
    report.accepted = unique;

    for mut manifest in duplicates {
        manifest.duplicate = true;
        let error = OmphalosError::DuplicateName {
            name: manifest.name.clone(),
            location: manifest.location.display().to_string(),
        };
        tracing::warn!(bundle = %manifest.name, location = %manifest.location.display(), "Skipping bundle: {error}");
        report.rejected.push(Rejection {
            location: manifest.location,
            name: Some(manifest.name),
            error,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_temp_dir, package, write_bundle, write_file};
    use serde_json::json;

    fn options(root: &Path) -> DiscoveryOptions {
        DiscoveryOptions {
            primary_dir: root.join("bundles"),
            extra_paths: Vec::new(),
            install_root: root.to_path_buf(),
            ignore: Vec::new(),
            host_version: Version::new(0, 1, 0),
        }
    }

    fn names(report: &DiscoveryReport) -> Vec<&str> {
        report.accepted.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_discovers_sorted_candidates() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(&bundles, "zeta", &package("zeta", "1.0.0", json!({})));
        write_bundle(&bundles, "alpha", &package("alpha", "1.0.0", json!({})));
        std::fs::create_dir_all(bundles.join("not-a-bundle")).unwrap();

        let report = discover(&options(temp.path()));
        assert_eq!(names(&report), vec!["alpha", "zeta"]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_missing_primary_dir_is_empty() {
        let temp = create_temp_dir();
        let report = discover(&options(temp.path()));
        assert!(report.accepted.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_descriptor_comments_are_allowed() {
        let temp = create_temp_dir();
        let dir = temp.path().join("bundles/commented");
        write_file(
            &dir,
            MANIFEST_FILE,
            "{\n // bundle\n \"name\": \"commented\", /* v */ \"version\": \"1.0.0\",\n \"omphalos\": { \"compatibleRange\": \"*\" }\n}",
        );

        let report = discover(&options(temp.path()));
        assert_eq!(names(&report), vec!["commented"]);
    }

    #[test]
    fn test_invalid_candidate_is_isolated() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(&bundles, "good", &package("good", "1.0.0", json!({})));
        write_bundle(&bundles, "bad", &json!({ "name": "bad", "version": "nope" }));
        write_file(&bundles.join("broken"), MANIFEST_FILE, "{ not json");

        let report = discover(&options(temp.path()));
        assert_eq!(names(&report), vec!["good"]);
        assert_eq!(report.rejected.len(), 2);
        assert!(
            report
                .rejected
                .iter()
                .all(|r| matches!(r.error, OmphalosError::SchemaError { .. }))
        );
    }

    #[test]
    fn test_ignored_bundles_are_not_rejected() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(&bundles, "keep", &package("keep", "1.0.0", json!({})));
        write_bundle(&bundles, "test-one", &package("test-one", "1.0.0", json!({})));
        write_bundle(&bundles, "exact", &package("exact", "1.0.0", json!({})));

        let mut opts = options(temp.path());
        opts.ignore = vec!["test-*".to_string(), "exact".to_string()];
        let report = discover(&opts);
        assert_eq!(names(&report), vec!["keep"]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_ignore_applies_before_bundle_section() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(&bundles, "legacy", &json!({ "name": "legacy", "version": "1.0.0" }));

        let mut opts = options(temp.path());
        opts.ignore = vec!["legacy".to_string()];
        let report = discover(&opts);
        assert!(report.accepted.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_incompatible_host_rejected() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(
            &bundles,
            "future",
            &package("future", "1.0.0", json!({ "compatibleRange": "^2.0" })),
        );

        let report = discover(&options(temp.path()));
        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected[0].name.as_deref(), Some("future"));
        assert!(matches!(
            report.rejected[0].error,
            OmphalosError::IncompatibleHost { .. }
        ));
    }

    #[test]
    fn test_all_duplicates_excluded() {
        let temp = create_temp_dir();
        let bundles = temp.path().join("bundles");
        write_bundle(&bundles, "one", &package("twin", "1.0.0", json!({})));
        write_bundle(&bundles, "two", &package("twin", "1.1.0", json!({})));
        write_bundle(&bundles, "three", &package("twin", "1.2.0", json!({})));
        write_bundle(&bundles, "solo", &package("solo", "1.0.0", json!({})));

        let report = discover(&options(temp.path()));
        assert_eq!(names(&report), vec!["solo"]);
        assert_eq!(report.rejected.len(), 3);
        assert!(
            report
                .rejected
                .iter()
                .all(|r| matches!(r.error, OmphalosError::DuplicateName { .. }))
        );
    }

    #[test]
    fn test_extra_paths() {
        let temp = create_temp_dir();
        write_bundle(&temp.path().join("bundles"), "main", &package("main", "1.0.0", json!({})));
        write_bundle(&temp.path().join("elsewhere"), "extra", &package("extra", "1.0.0", json!({})));
        std::fs::create_dir_all(temp.path().join("empty")).unwrap();

        let mut opts = options(temp.path());
        opts.extra_paths = vec![PathBuf::from("elsewhere/extra"), temp.path().join("empty")];
        let report = discover(&opts);
        assert_eq!(names(&report), vec!["main", "extra"]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_same_directory_listed_twice_is_one_bundle() {
        let temp = create_temp_dir();
        write_bundle(&temp.path().join("bundles"), "main", &package("main", "1.0.0", json!({})));

        let mut opts = options(temp.path());
        opts.extra_paths = vec![
            PathBuf::from("bundles/main"),
            PathBuf::from("bundles/../bundles/main"),
            temp.path().join("bundles").join("main"),
        ];
        let report = discover(&opts);
        assert_eq!(names(&report), vec!["main"]);
        assert!(report.rejected.is_empty());
        assert!(!report.accepted[0].duplicate);
    }

    #[test]
    fn test_is_ignored() {
        let patterns = vec!["demo-*".to_string(), "exact".to_string()];
        assert!(is_ignored("demo-clock", &patterns));
        assert!(is_ignored("exact", &patterns));
        assert!(!is_ignored("exactly", &patterns));
        assert!(!is_ignored("clock", &patterns));
    }
}
