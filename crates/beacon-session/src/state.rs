//! Observable session state.
//!
//! All mutation funnels through the event router or the session's own
//! serialized methods; readers get cheap snapshots. Lock scopes never cross
//! an await.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use uuid::Uuid;

/// A sent or received message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    /// Random, unique id. Ids are synthetic and not synchronized across peers.
    pub id: Uuid,
    /// Message body.
    pub text: String,
    /// User id of the sender.
    pub sender: String,
}

/// Shared observable state for one session.
///
/// Message history is kept in arrival order; concurrent senders are not
/// totally ordered and no correction is attempted.
#[derive(Default)]
pub struct SharedState {
    messages: RwLock<Vec<SignalMessage>>,
    remote_users: RwLock<HashMap<String, HashMap<String, String>>>,
    topics: RwLock<Vec<String>>,
    logged_in: AtomicBool,
}

impl SharedState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the history with a fresh synthetic id.
    pub fn push_message(&self, sender: impl Into<String>, text: impl Into<String>) {
        let message = SignalMessage {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: sender.into(),
        };
        self.messages
            .write()
            .expect("state lock poisoned")
            .push(message);
    }

    /// Snapshot of the message history, in arrival order.
    pub fn messages(&self) -> Vec<SignalMessage> {
        self.messages.read().expect("state lock poisoned").clone()
    }

    /// Replace the remote roster wholesale, excluding the local user.
    pub fn replace_roster(
        &self,
        states: HashMap<String, HashMap<String, String>>,
        local_user: &str,
    ) {
        let mut roster = self.remote_users.write().expect("state lock poisoned");
        *roster = states;
        let _ = roster.remove(local_user);
    }

    /// A remote user joined. Joining twice is a no-op.
    pub fn user_joined(&self, user: &str) {
        let mut roster = self.remote_users.write().expect("state lock poisoned");
        if !roster.contains_key(user) {
            let _ = roster.insert(user.to_string(), HashMap::new());
        }
    }

    /// A remote user left. Leaving an absent entry is a no-op.
    pub fn user_left(&self, user: &str) {
        let _ = self
            .remote_users
            .write()
            .expect("state lock poisoned")
            .remove(user);
    }

    /// Replace one user's key-value state.
    pub fn user_state_changed(&self, user: String, states: HashMap<String, String>) {
        let _ = self
            .remote_users
            .write()
            .expect("state lock poisoned")
            .insert(user, states);
    }

    /// Snapshot of the remote roster.
    pub fn remote_users(&self) -> HashMap<String, HashMap<String, String>> {
        self.remote_users
            .read()
            .expect("state lock poisoned")
            .clone()
    }

    /// Add a topic to the active list. Returns false if already present.
    pub fn add_topic(&self, topic: &str) -> bool {
        let mut topics = self.topics.write().expect("state lock poisoned");
        if topics.iter().any(|t| t == topic) {
            false
        } else {
            topics.push(topic.to_string());
            true
        }
    }

    /// Remove a topic from the active list.
    pub fn remove_topic(&self, topic: &str) {
        self.topics
            .write()
            .expect("state lock poisoned")
            .retain(|t| t != topic);
    }

    /// Drop every tracked topic, used when the stream channel is left.
    pub fn clear_topics(&self) {
        self.topics.write().expect("state lock poisoned").clear();
    }

    /// Snapshot of the active topic list.
    pub fn topics(&self) -> Vec<String> {
        self.topics.read().expect("state lock poisoned").clone()
    }

    /// Whether the session is currently logged in.
    pub fn logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub(crate) fn set_logged_in(&self, value: bool) {
        self.logged_in.store(value, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
