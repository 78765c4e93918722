//! Dependency errors

use super::OmphalosError;

/// Creates a circular dependency error from a rendered chain
pub fn circular(chain: impl Into<String>) -> OmphalosError {
    OmphalosError::CircularDependency {
        chain: chain.into(),
    }
}

/// Creates a missing dependency error
pub fn not_found(name: impl Into<String>, dependency: impl Into<String>) -> OmphalosError {
    OmphalosError::DependencyNotFound {
        name: name.into(),
        dependency: dependency.into(),
    }
}

/// Creates a cascading exclusion error
pub fn excluded(name: impl Into<String>, dependency: impl Into<String>) -> OmphalosError {
    OmphalosError::DependencyExcluded {
        name: name.into(),
        dependency: dependency.into(),
    }
}
