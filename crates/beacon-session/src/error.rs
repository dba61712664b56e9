//! Session-layer errors.
//!
//! Engine failures are classified at the session/membership boundary and
//! either recovered transparently (refresh-and-retry), turned into a status
//! string for the sink, or propagated here. The UI layer observes the status
//! sink; these errors exist for programmatic callers and tests.

use beacon_auth::TokenError;
use beacon_engine::EngineError;
use thiserror::Error;

use crate::session::Capability;

/// Errors surfaced by session and membership operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation attempted on a destroyed or not-yet-initialized session.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// Operation requires a capability not selected at session construction.
    #[error("capability {0:?} not enabled for this session")]
    CapabilityDisabled(Capability),

    /// Token refresh was needed but no credential provider is configured.
    #[error("no credential provider configured")]
    NoProvider,

    /// Token fetch failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The engine reported a failure that was not recovered.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
