//! File system errors

use super::OmphalosError;

/// Creates a file read error
pub fn read_failed(path: impl Into<String>, reason: impl Into<String>) -> OmphalosError {
    OmphalosError::FileReadFailed {
        path: path.into(),
        reason: reason.into(),
    }
}
