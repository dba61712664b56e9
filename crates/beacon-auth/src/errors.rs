//! Token fetch errors.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while fetching a token.
///
/// These are not classified further upstream: a failed refresh simply aborts
/// the pending retry and the original auth error is surfaced.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint URL is malformed.
    #[error("invalid token endpoint: {0}")]
    InvalidEndpoint(String),

    /// The endpoint was unreachable at the transport level.
    #[error("token request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("token endpoint returned status {status}")]
    Status {
        /// HTTP status code of the response.
        status: u16,
    },

    /// The response body was not valid JSON or was missing the `token` field.
    #[error("malformed token response: {0}")]
    Decode(String),

    /// The request did not complete within the configured timeout.
    #[error("token request timed out after {0:?}")]
    Timeout(Duration),
}
