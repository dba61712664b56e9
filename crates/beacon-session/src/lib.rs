//! # beacon-session
//!
//! The session/connection lifecycle core: login and token-refresh recovery,
//! channel membership with subscribe-time error classification, and
//! event-driven state propagation to observers.
//!
//! Structure:
//!
//! - [`session::Session`]: owns the engine handle; login / logout / destroy
//!   state machine with the refresh-once recovery path
//! - [`membership::MembershipManager`]: message-channel subscriptions and
//!   stream-channel topics
//! - [`router`]: the single dispatch point applying inbound engine events to
//!   observable state
//! - [`state::SharedState`]: message history, remote-user roster, topic list
//! - [`status::StatusSink`]: the latest human-readable status string
//!
//! Sessions are fully independent: each owns its engine exclusively and
//! shares no mutable state with any other session.

#![deny(unsafe_code)]

pub mod error;
pub mod membership;
pub mod router;
pub mod session;
pub mod state;
pub mod status;

pub use error::SessionError;
pub use membership::{ChannelMembership, MembershipManager, MembershipState};
pub use router::{StorageNotice, route, spawn_router};
pub use session::{Capability, Session, SessionConfig, SessionState};
pub use state::{SharedState, SignalMessage};
pub use status::StatusSink;

#[cfg(test)]
pub(crate) mod testutil;
