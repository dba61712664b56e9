//! Event routing.
//!
//! A single dispatch point per session: the router consumes the engine's
//! event stream and applies each event to observable state in arrival order.
//! All mutation of [`SharedState`] from engine events goes through here, so
//! readers see one consistent ordering.

use std::sync::Arc;

use beacon_core::events::{InboundEvent, PresenceEvent, StorageEventType, StorageType};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::session::Session;

/// A storage change the session surfaces to observers, e.g. to trigger a
/// metadata re-fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageNotice {
    /// Channel or user the metadata belongs to.
    pub subject: String,
    /// What happened.
    pub event_type: StorageEventType,
    /// User or channel metadata.
    pub storage_type: StorageType,
}

/// Spawn the router task for `session`.
///
/// Runs until the engine drops its event stream (on release). A lagged
/// receiver skips to the stream head and keeps going; dropped events are
/// logged, not replayed.
pub fn spawn_router(session: Arc<Session>) -> JoinHandle<()> {
    let mut events = session.engine().subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => route(&session, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("event stream closed, router stopping");
    })
}

/// Apply one event to the session's observable state.
pub async fn route(session: &Session, event: InboundEvent) {
    match event {
        InboundEvent::Message {
            topic,
            publisher,
            content,
            ..
        } => {
            let text = match topic {
                Some(topic) => format!("[{topic}]\n{content}"),
                None => content,
            };
            session.shared().push_message(publisher, text);
        }
        InboundEvent::Presence { channel, event } => {
            apply_presence(session, &channel, event);
        }
        InboundEvent::Storage {
            subject,
            event_type,
            storage_type,
        } => {
            session.notify_storage(subject, event_type, storage_type);
        }
        InboundEvent::ConnectionState { state, reason, .. } => {
            session
                .status()
                .set(format!("Connection\nstate: {state}\nreason: {reason}"));
        }
        InboundEvent::TokenPrivilegeWillExpire => {
            session.renew_token_proactively().await;
        }
    }
}

fn apply_presence(session: &Session, channel: &str, event: PresenceEvent) {
    let shared = session.shared();
    match event {
        PresenceEvent::Snapshot { states } => {
            tracing::debug!(channel, users = states.len(), "roster snapshot");
            shared.replace_roster(states, session.user_id());
        }
        PresenceEvent::RemoteJoin { user } => shared.user_joined(&user),
        PresenceEvent::RemoteLeave { user } => shared.user_left(&user),
        PresenceEvent::StateChanged { user, states } => {
            shared.user_state_changed(user, states);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
