//! Inbound event model.
//!
//! [`InboundEvent`] is the tagged union of everything the signaling engine
//! pushes at a session. Events are immutable once created and are consumed by
//! a single dispatch point (the session's event router), which applies them to
//! observable state in arrival order. Arrival order may differ from send order
//! under network reordering; that is accepted, not corrected.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An asynchronous event pushed by the signaling engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundEvent {
    /// A message arrived on a subscribed channel or topic.
    #[serde(rename_all = "camelCase")]
    Message {
        /// Channel the message arrived on.
        channel: String,
        /// Stream-channel topic, when the message came through one.
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        /// User id of the sender.
        publisher: String,
        /// Message body. UTF-8 text.
        content: String,
    },

    /// Presence changed on a subscribed channel.
    Presence {
        /// Channel the presence event refers to.
        channel: String,
        /// What changed.
        event: PresenceEvent,
    },

    /// User or channel metadata changed.
    #[serde(rename_all = "camelCase")]
    Storage {
        /// Channel or user the metadata belongs to.
        subject: String,
        /// What happened to the metadata.
        event_type: StorageEventType,
        /// Whether user or channel metadata changed.
        storage_type: StorageType,
    },

    /// The engine's connection state changed.
    #[serde(rename_all = "camelCase")]
    ConnectionState {
        /// Channel the state change refers to.
        channel: String,
        /// New connection state.
        state: ConnectionState,
        /// Why the state changed.
        reason: ConnectionChangeReason,
    },

    /// The login token will expire soon; renew it proactively.
    TokenPrivilegeWillExpire,
}

/// Presence change on a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PresenceEvent {
    /// Full roster snapshot: user id to per-user key-value state.
    Snapshot {
        /// All users currently in the channel, including the local user.
        states: HashMap<String, HashMap<String, String>>,
    },
    /// A remote user joined the channel.
    RemoteJoin {
        /// User id that joined.
        user: String,
    },
    /// A remote user left the channel.
    RemoteLeave {
        /// User id that left.
        user: String,
    },
    /// A remote user's key-value state changed.
    StateChanged {
        /// User id whose state changed.
        user: String,
        /// The user's full replacement state.
        states: HashMap<String, String>,
    },
}

/// What happened to a piece of stored metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageEventType {
    /// Metadata was created.
    Set,
    /// Metadata was updated in place.
    Update,
    /// Metadata was removed.
    Remove,
    /// Full metadata snapshot delivered on subscribe.
    Snapshot,
}

/// Which kind of metadata a storage event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageType {
    /// Metadata attached to a user.
    User,
    /// Metadata attached to a channel.
    Channel,
}

/// Connection state of the engine's link to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No link.
    Disconnected,
    /// Link being established.
    Connecting,
    /// Link up and authenticated.
    Connected,
    /// Link lost, engine retrying.
    Reconnecting,
    /// Link failed permanently.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why the engine's connection state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionChangeReason {
    /// Login started.
    Login,
    /// Login completed.
    LoginSuccess,
    /// Logout requested.
    Logout,
    /// The link was interrupted.
    Interrupted,
    /// The backend banned this connection.
    BannedByServer,
    /// The login token expired.
    TokenExpired,
    /// The engine is routing through a configured proxy server.
    SettingProxyServer,
    /// Reason not otherwise categorized.
    Unknown,
}

impl fmt::Display for ConnectionChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Login => "login",
            Self::LoginSuccess => "login success",
            Self::Logout => "logout",
            Self::Interrupted => "interrupted",
            Self::BannedByServer => "banned by server",
            Self::TokenExpired => "token expired",
            Self::SettingProxyServer => "setting proxy server",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
