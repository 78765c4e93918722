//! Configuration errors

use super::OmphalosError;

/// Creates an invalid configuration error
pub fn invalid(message: impl Into<String>) -> OmphalosError {
    OmphalosError::ConfigInvalid {
        message: message.into(),
    }
}

/// Creates a configuration parse error for a file
pub fn parse_failed(path: impl Into<String>, reason: impl Into<String>) -> OmphalosError {
    OmphalosError::ConfigParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}
