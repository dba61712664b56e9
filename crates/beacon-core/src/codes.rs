//! Engine error codes and their classification.
//!
//! The signaling engine reports failures from login and subscribe through one
//! shared error-code space. Both call sites classify codes through the same
//! [`classify`] table, so recovery policy lives in exactly one place.

use serde::{Deserialize, Serialize};

/// Error codes reported by the signaling engine.
///
/// Codes the session layer never acts on individually are folded into
/// [`ErrorCode::Unknown`] with the raw numeric code preserved for diagnosis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// The presented token is not valid for this app or user.
    InvalidToken,
    /// The presented token has expired.
    TokenExpired,
    /// The backend had no resources to accept the login.
    LoginNoServerResources,
    /// Login did not complete in time.
    LoginTimeout,
    /// The backend rejected the login.
    LoginRejected,
    /// Login was aborted before completing.
    LoginAborted,
    /// Channel subscription failed.
    SubscribeFailed,
    /// Channel subscription did not complete in time.
    SubscribeTimeout,
    /// Operation requires an active subscription that does not exist.
    NotSubscribed,
    /// Any code the session layer has no specific handling for.
    Unknown(i32),
}

/// Recovery categories for engine failures.
///
/// Derived data, never persisted. The session retries `TokenInvalid` once
/// after a refresh; everything else is surfaced as a status string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Token is invalid or expired; a refresh-and-retry is worth one attempt.
    TokenInvalid,
    /// Login failed for a non-token reason; check credentials.
    LoginFailure,
    /// Subscribing to a channel failed.
    SubscribeFailure,
    /// Uncategorized; surfaced with operation and reason.
    Other,
}

/// Classify an engine error code into its recovery category.
pub fn classify(code: ErrorCode) -> ErrorClass {
    match code {
        ErrorCode::InvalidToken | ErrorCode::TokenExpired => ErrorClass::TokenInvalid,
        ErrorCode::LoginNoServerResources
        | ErrorCode::LoginTimeout
        | ErrorCode::LoginRejected
        | ErrorCode::LoginAborted => ErrorClass::LoginFailure,
        ErrorCode::SubscribeFailed | ErrorCode::SubscribeTimeout | ErrorCode::NotSubscribed => {
            ErrorClass::SubscribeFailure
        }
        ErrorCode::Unknown(_) => ErrorClass::Other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
