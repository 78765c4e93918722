//! Messaging relay errors

use super::OmphalosError;

/// Creates a protocol violation error for a connection
pub fn protocol_violation(connection: u64, reason: impl Into<String>) -> OmphalosError {
    OmphalosError::ProtocolViolation {
        connection,
        reason: reason.into(),
    }
}

/// Creates a double unlisten error
pub fn double_unlisten(event: impl Into<String>, bundle: impl Into<String>) -> OmphalosError {
    OmphalosError::DoubleUnlisten {
        event: event.into(),
        bundle: bundle.into(),
    }
}
