//! Manifest and bundle loading errors

use super::OmphalosError;

/// Creates a schema error listing every violated field
pub fn schema(location: impl Into<String>, violations: Vec<String>) -> OmphalosError {
    OmphalosError::SchemaError {
        location: location.into(),
        violations,
    }
}

/// Creates a bundle load error for an expected configuration problem
pub fn load_failed(bundle: impl Into<String>, reason: impl Into<String>) -> OmphalosError {
    OmphalosError::BundleLoad {
        bundle: bundle.into(),
        reason: reason.into(),
    }
}

/// Creates an extension failure error
pub fn extension_failed(bundle: impl Into<String>, reason: impl Into<String>) -> OmphalosError {
    OmphalosError::ExtensionFailed {
        bundle: bundle.into(),
        reason: reason.into(),
    }
}
