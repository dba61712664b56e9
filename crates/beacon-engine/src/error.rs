//! Engine failure type.

use beacon_core::codes::{ErrorClass, ErrorCode, classify};
use thiserror::Error;

/// A failure reported by the signaling engine.
///
/// Carries the raw operation name and reason string for diagnosis; the code
/// is what recovery policy is decided on.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{operation} failed: {reason}")]
pub struct EngineError {
    /// Code from the shared engine error-code space.
    pub code: ErrorCode,
    /// Name of the operation that failed (e.g. `login`, `subscribe`).
    pub operation: String,
    /// Human-readable reason from the engine.
    pub reason: String,
}

impl EngineError {
    /// Create an engine error.
    pub fn new(code: ErrorCode, operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code,
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Recovery category of this error.
    pub fn class(&self) -> ErrorClass {
        classify(self.code)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_operation_and_reason() {
        let err = EngineError::new(ErrorCode::LoginRejected, "login", "bad app id");
        assert_eq!(err.to_string(), "login failed: bad app id");
    }

    #[test]
    fn class_follows_the_shared_table() {
        let err = EngineError::new(ErrorCode::TokenExpired, "login", "expired");
        assert_eq!(err.class(), ErrorClass::TokenInvalid);
    }
}
