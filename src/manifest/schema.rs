//! Manifest schema validation
//!
//! Validation runs in two phases so discovery can consult the ignore list
//! after the name is known but before the bundle section is inspected.
//! Each phase collects every violation instead of stopping at the first one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use serde_json::{Map, Value};

use super::{BUNDLE_SECTION, GraphicDescriptor, MANIFEST_FILE, Manifest, PanelDescriptor, Size};
use crate::error::{Result, schema_error};

/// Characters a bundle name may not contain; names double as route prefixes
const FORBIDDEN_NAME_CHARS: &[char] = &[':', '*', '{', '}', '/', '\\'];

/// Top level identity of a package descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub version: Version,
}

/// Accumulates violations under dotted field paths
#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn push(&mut self, path: &str, message: impl AsRef<str>) {
        self.0.push(format!("{path}: {}", message.as_ref()));
    }

    fn into_result<T>(self, location: &Path, value: T) -> Result<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(schema_error(descriptor_path(location), self.0))
        }
    }
}

fn descriptor_path(location: &Path) -> String {
    location.join(MANIFEST_FILE).display().to_string()
}

/// Validate the package identity: `name` and `version`
pub fn validate_package(raw: &Value, location: &Path) -> Result<PackageInfo> {
    let mut violations = Violations::default();

    let Some(object) = raw.as_object() else {
        violations.push("(root)", "expected an object");
        return Err(schema_error(descriptor_path(location), violations.0));
    };

    let name = match object.get("name") {
        Some(Value::String(name)) => {
            if name.is_empty() {
                violations.push("name", "must not be empty");
            } else if name.chars().any(char::is_whitespace) {
                violations.push("name", "must not contain whitespace");
            } else if name.contains(FORBIDDEN_NAME_CHARS) {
                violations.push("name", "must not contain ':', '*', '{', '}' or slashes");
            }
            name.clone()
        }
        Some(_) => {
            violations.push("name", "expected a string");
            String::new()
        }
        None => {
            violations.push("name", "is required");
            String::new()
        }
    };

    let version = match object.get("version") {
        Some(Value::String(version)) => match Version::parse(version) {
            Ok(parsed) => parsed,
            Err(e) => {
                violations.push("version", format!("not a semantic version ({e})"));
                Version::new(0, 0, 0)
            }
        },
        Some(_) => {
            violations.push("version", "expected a string");
            Version::new(0, 0, 0)
        }
        None => {
            violations.push("version", "is required");
            Version::new(0, 0, 0)
        }
    };

    violations.into_result(location, PackageInfo { name, version })
}

/// Validate the bundle section and assemble the manifest
pub fn validate_bundle_section(package: PackageInfo, raw: &Value, location: &Path) -> Result<Manifest> {
    let mut violations = Violations::default();
    let empty = Map::new();

    let section = match raw.get(BUNDLE_SECTION) {
        Some(Value::Object(section)) => section,
        Some(_) => {
            violations.push(BUNDLE_SECTION, "expected an object");
            &empty
        }
        None => {
            violations.push(BUNDLE_SECTION, "is required");
            &empty
        }
    };
    let path = |field: &str| format!("{BUNDLE_SECTION}.{field}");

    let compatible_range = match section.get("compatibleRange") {
        Some(Value::String(range)) => match parse_range(range) {
            Ok(req) => req,
            Err(reason) => {
                violations.push(&path("compatibleRange"), reason);
                VersionReq::STAR
            }
        },
        Some(_) => {
            violations.push(&path("compatibleRange"), "expected a string");
            VersionReq::STAR
        }
        None => {
            // already reported when the whole section is missing
            if raw.get(BUNDLE_SECTION).is_some() {
                violations.push(&path("compatibleRange"), "is required");
            }
            VersionReq::STAR
        }
    };

    let mut dependencies = BTreeMap::new();
    match section.get("deps") {
        None | Some(Value::Null) => {}
        Some(Value::Object(deps)) => {
            for (name, range) in deps {
                let field = path(&format!("deps.{name}"));
                match range.as_str().map(parse_range) {
                    Some(Ok(req)) => {
                        dependencies.insert(name.clone(), req);
                    }
                    Some(Err(reason)) => violations.push(&field, reason),
                    None => violations.push(&field, "expected a version range string"),
                }
            }
        }
        Some(_) => violations.push(&path("deps"), "expected an object"),
    }

    let extension = match section.get("extension") {
        None | Some(Value::Null) => None,
        Some(Value::String(entry)) if entry.is_empty() => {
            violations.push(&path("extension"), "must not be empty");
            None
        }
        Some(Value::String(entry)) => Some(PathBuf::from(entry)),
        Some(_) => {
            violations.push(&path("extension"), "expected a string");
            None
        }
    };

    let panels = array_items(section, "panels", &mut violations)
        .into_iter()
        .filter_map(|(index, item)| panel(item, &path(&format!("panels[{index}]")), &mut violations))
        .collect();

    let graphics = array_items(section, "graphics", &mut violations)
        .into_iter()
        .filter_map(|(index, item)| {
            graphic(item, &path(&format!("graphics[{index}]")), &mut violations)
        })
        .collect();

    let manifest = Manifest {
        name: package.name,
        version: package.version,
        compatible_range,
        dependencies,
        extension,
        panels,
        graphics,
        location: location.to_path_buf(),
        duplicate: false,
    };
    violations.into_result(location, manifest)
}

/// Run both validation phases
#[cfg(test)]
pub fn validate(raw: &Value, location: &Path) -> Result<Manifest> {
    let package = validate_package(raw, location)?;
    validate_bundle_section(package, raw, location)
}

/// Parse a version range
///
/// Accepts the comma separated form understood by `semver` as well as the
/// space separated comparator sets and hyphen ranges common in package
/// descriptors (`">=1.0.0 <2.0.0"`, `"1.0.0 - 2.0.0"`).
pub fn parse_range(range: &str) -> std::result::Result<VersionReq, String> {
    let trimmed = range.trim();
    if trimmed.contains("||") {
        return Err(format!("'{trimmed}' uses '||', which is not supported"));
    }
    let normalized = if trimmed.contains(',') {
        trimmed.to_string()
    } else {
        normalize_comparators(trimmed)
    };
    VersionReq::parse(&normalized).map_err(|e| format!("invalid version range '{trimmed}' ({e})"))
}

fn normalize_comparators(range: &str) -> String {
    let tokens: Vec<&str> = range.split_whitespace().collect();
    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={low}, <={high}");
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
        } else {
            comparators.push(format!("{pending_op}{token}"));
            pending_op.clear();
        }
    }
    if !pending_op.is_empty() {
        comparators.push(pending_op);
    }
    comparators.join(", ")
}

fn array_items<'a>(
    section: &'a Map<String, Value>,
    field: &str,
    violations: &mut Violations,
) -> Vec<(usize, &'a Value)> {
    match section.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().enumerate().collect(),
        Some(_) => {
            violations.push(&format!("{BUNDLE_SECTION}.{field}"), "expected an array");
            Vec::new()
        }
    }
}

fn required_string(item: &Map<String, Value>, base: &str, field: &str, violations: &mut Violations) -> Option<String> {
    match item.get(field) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        Some(Value::String(_)) => {
            violations.push(&format!("{base}.{field}"), "must not be empty");
            None
        }
        Some(_) => {
            violations.push(&format!("{base}.{field}"), "expected a string");
            None
        }
        None => {
            violations.push(&format!("{base}.{field}"), "is required");
            None
        }
    }
}

fn optional_bool(item: &Map<String, Value>, base: &str, field: &str, violations: &mut Violations) -> bool {
    match item.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(_) => {
            violations.push(&format!("{base}.{field}"), "expected a boolean");
            false
        }
    }
}

fn dimension(value: Option<&Value>, path: &str, violations: &mut Violations) -> Option<u32> {
    match value {
        None => {
            violations.push(path, "is required");
            None
        }
        Some(value) => match value.as_u64().map(u32::try_from) {
            Some(Ok(dim)) => Some(dim),
            _ => {
                violations.push(path, "expected a non-negative integer");
                None
            }
        },
    }
}

fn size(value: Option<&Value>, path: &str, violations: &mut Violations) -> Option<Size> {
    let object = match value {
        Some(Value::Object(object)) => object,
        Some(_) => {
            violations.push(path, "expected an object with width and height");
            return None;
        }
        None => {
            violations.push(path, "is required");
            return None;
        }
    };
    let width = dimension(object.get("width"), &format!("{path}.width"), violations);
    let height = dimension(object.get("height"), &format!("{path}.height"), violations);
    Some(Size {
        width: width?,
        height: height?,
    })
}

fn optional_size(item: &Map<String, Value>, base: &str, field: &str, violations: &mut Violations) -> Option<Size> {
    match item.get(field) {
        None | Some(Value::Null) => None,
        value => size(value, &format!("{base}.{field}"), violations),
    }
}

fn panel(item: &Value, base: &str, violations: &mut Violations) -> Option<PanelDescriptor> {
    let Some(item) = item.as_object() else {
        violations.push(base, "expected an object");
        return None;
    };
    let file = required_string(item, base, "file", violations);
    let name = required_string(item, base, "name", violations);
    let title = required_string(item, base, "title", violations);
    let size = size(item.get("size"), &format!("{base}.size"), violations);
    let min_size = optional_size(item, base, "minSize", violations);
    let max_size = optional_size(item, base, "maxSize", violations);
    let locked = optional_bool(item, base, "locked", violations);
    let fullbleed = optional_bool(item, base, "fullbleed", violations);
    let workspace = match item.get("workspace") {
        None | Some(Value::Null) => None,
        Some(Value::String(workspace)) => Some(workspace.clone()),
        Some(_) => {
            violations.push(&format!("{base}.workspace"), "expected a string");
            None
        }
    };

    Some(PanelDescriptor {
        file: file?,
        name: name?,
        title: title?,
        size: size?,
        min_size,
        max_size,
        locked,
        workspace,
        fullbleed,
    })
}

fn graphic(item: &Value, base: &str, violations: &mut Violations) -> Option<GraphicDescriptor> {
    let Some(item) = item.as_object() else {
        violations.push(base, "expected an object");
        return None;
    };
    let file = required_string(item, base, "file", violations);
    let size = size(item.get("size"), &format!("{base}.size"), violations);
    let single_instance = optional_bool(item, base, "singleInstance", violations);

    Some(GraphicDescriptor {
        file: file?,
        size: size?,
        single_instance,
    })
}
