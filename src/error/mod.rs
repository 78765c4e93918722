//! Error types and handling for Omphalos
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`bundle`]: Manifest and bundle loading errors
//! - [`deps`]: Dependency resolution errors
//! - [`relay`]: Messaging relay errors
//! - [`config`]: Configuration errors
//! - [`fs`]: File system errors

pub mod bundle;
pub mod config;
pub mod deps;
pub mod fs;
pub mod relay;

pub use bundle::{load_failed as bundle_load_failed, schema as schema_error};
pub use config::{invalid as config_invalid, parse_failed as config_parse_failed};
pub use deps::{circular as circular_dependency, not_found as dependency_not_found};
pub use fs::read_failed as file_read_failed;
pub use relay::protocol_violation;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Omphalos operations
#[derive(Error, Diagnostic, Debug)]
pub enum OmphalosError {
    // Manifest errors
    #[error("Invalid bundle manifest at {location}: {}", violations.join("; "))]
    #[diagnostic(
        code(omphalos::manifest::schema),
        help("Fix the listed fields in the bundle's package.json")
    )]
    SchemaError {
        location: String,
        violations: Vec<String>,
    },

    #[error("Bundle '{name}' requires host version {range}, but this is {host}")]
    #[diagnostic(
        code(omphalos::bundle::incompatible_host),
        help("Update the bundle or adjust its compatibleRange")
    )]
    IncompatibleHost {
        name: String,
        range: String,
        host: String,
    },

    #[error("Bundle name '{name}' is used by more than one bundle")]
    #[diagnostic(
        code(omphalos::bundle::duplicate_name),
        help("Every copy is skipped; remove or rename all but one of them")
    )]
    DuplicateName { name: String, location: String },

    // Dependency errors
    #[error("Bundle '{name}' depends on itself")]
    #[diagnostic(code(omphalos::deps::self_dependency))]
    SelfDependency { name: String },

    #[error("Bundle '{name}' depends on '{dependency}', which is not available")]
    #[diagnostic(code(omphalos::deps::not_found))]
    DependencyNotFound { name: String, dependency: String },

    #[error("Bundle '{name}' requires {dependency} {required}, but version {found} is available")]
    #[diagnostic(code(omphalos::deps::incompatible))]
    IncompatibleDependency {
        name: String,
        dependency: String,
        required: String,
        found: String,
    },

    #[error("Bundle '{name}' depends on '{dependency}', which was excluded")]
    #[diagnostic(code(omphalos::deps::excluded))]
    DependencyExcluded { name: String, dependency: String },

    #[error("Circular dependency detected: {chain}")]
    #[diagnostic(
        code(omphalos::deps::circular),
        help("Remove the circular dependency from the bundle manifests")
    )]
    CircularDependency { chain: String },

    // Load errors
    #[error("Unable to load bundle '{bundle}': {reason}")]
    #[diagnostic(code(omphalos::bundle::load_failed))]
    BundleLoad { bundle: String, reason: String },

    #[error("Extension of bundle '{bundle}' failed: {reason}")]
    #[diagnostic(code(omphalos::extension::failed))]
    ExtensionFailed { bundle: String, reason: String },

    #[error("Extension of bundle '{bundle}' did not finish within {seconds}s")]
    #[diagnostic(
        code(omphalos::extension::timeout),
        help("Raise bundles.load_timeout_secs or fix the extension entry point")
    )]
    ExtensionTimeout { bundle: String, seconds: u64 },

    // Relay errors
    #[error("Protocol violation on connection {connection}: {reason}")]
    #[diagnostic(code(omphalos::relay::protocol_violation))]
    ProtocolViolation { connection: u64, reason: String },

    #[error("Graphic '{asset}' of bundle '{bundle}' is already being displayed")]
    #[diagnostic(code(omphalos::relay::asset_in_use))]
    AssetInUse { bundle: String, asset: String },

    #[error("Listener for '{event}' in bundle '{bundle}' was already removed")]
    #[diagnostic(code(omphalos::relay::double_unlisten))]
    DoubleUnlisten { event: String, bundle: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(omphalos::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}")]
    #[diagnostic(code(omphalos::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(omphalos::config::invalid))]
    ConfigInvalid { message: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(omphalos::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(omphalos::fs::io_error))]
    IoError { message: String },

    // Server errors
    #[error("Server failed: {message}")]
    #[diagnostic(code(omphalos::server::failed))]
    ServerFailed { message: String },
}

impl OmphalosError {
    /// Whether this is an expected configuration problem rather than a defect.
    ///
    /// Expected problems are logged as a single line; defects are logged with
    /// their full debug representation.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            OmphalosError::ExtensionFailed { .. }
                | OmphalosError::IoError { .. }
                | OmphalosError::ServerFailed { .. }
        )
    }
}

impl From<std::io::Error> for OmphalosError {
    fn from(err: std::io::Error) -> Self {
        OmphalosError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for OmphalosError {
    fn from(err: serde_yaml::Error) -> Self {
        OmphalosError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OmphalosError {
    fn from(err: serde_json::Error) -> Self {
        OmphalosError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, OmphalosError>;
