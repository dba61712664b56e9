//! In-process loopback engine.
//!
//! [`LoopbackEngine`] implements the engine traits entirely in memory: logins
//! always succeed, published messages are echoed back on the inbound event
//! stream by a simulated remote peer (`"echo"`), and metadata lives in maps.
//! It backs the demo binary and cross-crate tests; it performs no network I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use beacon_core::codes::ErrorCode;
use beacon_core::events::{
    ConnectionChangeReason, ConnectionState, InboundEvent, PresenceEvent, StorageEventType,
    StorageType,
};
use tokio::sync::broadcast;

use crate::engine::{SignalingEngine, StreamChannel};
use crate::error::EngineError;
use crate::types::{ChannelFeature, EngineConfig, JoinOptions, MetadataItem, TopicQos};

/// User id of the simulated remote peer that echoes published messages.
pub const ECHO_USER: &str = "echo";

/// Inbound event buffer size.
const EVENT_CAPACITY: usize = 256;

/// In-memory [`SignalingEngine`] for demos and tests.
pub struct LoopbackEngine {
    config: EngineConfig,
    tx: broadcast::Sender<InboundEvent>,
    logged_in: AtomicBool,
    released: AtomicBool,
    subscriptions: Mutex<HashSet<String>>,
    user_metadata: Mutex<HashMap<String, Vec<MetadataItem>>>,
    channel_metadata: Mutex<HashMap<String, Vec<MetadataItem>>>,
    // Presence state per (channel, user), written by set_user_state.
    user_states: Mutex<HashMap<(String, String), Vec<MetadataItem>>>,
}

impl LoopbackEngine {
    /// Create a loopback engine for the given config.
    ///
    /// Proxy and encryption settings are accepted and logged but otherwise
    /// have no effect in-process.
    pub fn new(config: EngineConfig) -> Self {
        if let Some(proxy) = &config.proxy {
            tracing::debug!(server = %proxy.server, port = proxy.port, "loopback: proxy configured");
        }
        if let Some(encryption) = &config.encryption {
            tracing::debug!(mode = encryption.mode, "loopback: encryption configured");
        }
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            tx,
            logged_in: AtomicBool::new(false),
            released: AtomicBool::new(false),
            subscriptions: Mutex::new(HashSet::new()),
            user_metadata: Mutex::new(HashMap::new()),
            channel_metadata: Mutex::new(HashMap::new()),
            user_states: Mutex::new(HashMap::new()),
        }
    }

    fn emit(&self, event: InboundEvent) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.tx.send(event);
    }

    fn ensure_usable(&self, operation: &str) -> Result<(), EngineError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(EngineError::new(
                ErrorCode::Unknown(-1),
                operation,
                "engine released",
            ));
        }
        Ok(())
    }

    fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions
            .lock()
            .expect("loopback lock poisoned")
            .contains(channel)
    }
}

#[async_trait]
impl SignalingEngine for LoopbackEngine {
    async fn login(&self, _token: Option<&str>) -> Result<(), EngineError> {
        self.ensure_usable("login")?;
        if self.config.proxy.is_some() {
            self.emit(InboundEvent::ConnectionState {
                channel: String::new(),
                state: ConnectionState::Connecting,
                reason: ConnectionChangeReason::SettingProxyServer,
            });
        }
        self.logged_in.store(true, Ordering::SeqCst);
        self.emit(InboundEvent::ConnectionState {
            channel: String::new(),
            state: ConnectionState::Connected,
            reason: ConnectionChangeReason::LoginSuccess,
        });
        Ok(())
    }

    async fn logout(&self) -> Result<(), EngineError> {
        self.ensure_usable("logout")?;
        self.logged_in.store(false, Ordering::SeqCst);
        self.emit(InboundEvent::ConnectionState {
            channel: String::new(),
            state: ConnectionState::Disconnected,
            reason: ConnectionChangeReason::Logout,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        features: &[ChannelFeature],
    ) -> Result<(), EngineError> {
        self.ensure_usable("subscribe")?;
        let _ = self
            .subscriptions
            .lock()
            .expect("loopback lock poisoned")
            .insert(channel.to_string());

        if features.contains(&ChannelFeature::Presence) {
            let mut states = HashMap::new();
            let _ = states.insert(ECHO_USER.to_string(), HashMap::new());
            let _ = states.insert(self.config.user_id.clone(), HashMap::new());
            self.emit(InboundEvent::Presence {
                channel: channel.to_string(),
                event: PresenceEvent::Snapshot { states },
            });
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), EngineError> {
        self.ensure_usable("unsubscribe")?;
        let _ = self
            .subscriptions
            .lock()
            .expect("loopback lock poisoned")
            .remove(channel);
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), EngineError> {
        self.ensure_usable("publish")?;
        if !self.logged_in.load(Ordering::SeqCst) {
            return Err(EngineError::new(
                ErrorCode::Unknown(-2),
                "publish",
                "not logged in",
            ));
        }
        // The echo peer answers only on channels the local user subscribed to.
        if self.is_subscribed(channel) {
            self.emit(InboundEvent::Message {
                channel: channel.to_string(),
                topic: None,
                publisher: ECHO_USER.to_string(),
                content: message.to_string(),
            });
        }
        Ok(())
    }

    async fn renew_token(&self, _token: &str) -> Result<(), EngineError> {
        self.ensure_usable("renewToken")
    }

    async fn create_stream_channel(
        &self,
        channel: &str,
    ) -> Result<Box<dyn StreamChannel>, EngineError> {
        self.ensure_usable("createStreamChannel")?;
        Ok(Box::new(LoopbackStreamChannel {
            name: channel.to_string(),
            tx: self.tx.clone(),
            topics: Mutex::new(HashSet::new()),
        }))
    }

    async fn get_user_metadata(&self, user_id: &str) -> Result<Vec<MetadataItem>, EngineError> {
        self.ensure_usable("getUserMetadata")?;
        Ok(self
            .user_metadata
            .lock()
            .expect("loopback lock poisoned")
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_user_metadata(
        &self,
        user_id: &str,
        items: Vec<MetadataItem>,
    ) -> Result<(), EngineError> {
        self.ensure_usable("setUserMetadata")?;
        {
            let mut all = self.user_metadata.lock().expect("loopback lock poisoned");
            let entry = all.entry(user_id.to_string()).or_default();
            for item in items {
                match entry.iter_mut().find(|existing| existing.key == item.key) {
                    Some(existing) => existing.value = item.value,
                    None => entry.push(item),
                }
            }
        }
        self.emit(InboundEvent::Storage {
            subject: user_id.to_string(),
            event_type: StorageEventType::Update,
            storage_type: StorageType::User,
        });
        Ok(())
    }

    async fn remove_user_metadata(
        &self,
        user_id: &str,
        keys: Vec<String>,
    ) -> Result<(), EngineError> {
        self.ensure_usable("removeUserMetadata")?;
        {
            let mut all = self.user_metadata.lock().expect("loopback lock poisoned");
            if let Some(entry) = all.get_mut(user_id) {
                entry.retain(|item| !keys.contains(&item.key));
            }
        }
        self.emit(InboundEvent::Storage {
            subject: user_id.to_string(),
            event_type: StorageEventType::Remove,
            storage_type: StorageType::User,
        });
        Ok(())
    }

    async fn get_channel_metadata(&self, channel: &str) -> Result<Vec<MetadataItem>, EngineError> {
        self.ensure_usable("getChannelMetadata")?;
        Ok(self
            .channel_metadata
            .lock()
            .expect("loopback lock poisoned")
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_online_users(&self, channel: &str) -> Result<Vec<String>, EngineError> {
        self.ensure_usable("getOnlineUsers")?;
        if self.is_subscribed(channel) {
            Ok(vec![self.config.user_id.clone(), ECHO_USER.to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn get_state(
        &self,
        channel: &str,
        user_id: &str,
    ) -> Result<Vec<MetadataItem>, EngineError> {
        self.ensure_usable("getState")?;
        Ok(self
            .user_states
            .lock()
            .expect("loopback lock poisoned")
            .get(&(channel.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_user_state(
        &self,
        channel: &str,
        items: Vec<MetadataItem>,
    ) -> Result<(), EngineError> {
        self.ensure_usable("setUserState")?;
        let _ = self
            .user_states
            .lock()
            .expect("loopback lock poisoned")
            .insert(
                (channel.to_string(), self.config.user_id.clone()),
                items.clone(),
            );
        let states = items
            .into_iter()
            .map(|item| (item.key, item.value))
            .collect();
        self.emit(InboundEvent::Presence {
            channel: channel.to_string(),
            event: PresenceEvent::StateChanged {
                user: self.config.user_id.clone(),
                states,
            },
        });
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<InboundEvent> {
        self.tx.subscribe()
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.logged_in.store(false, Ordering::SeqCst);
    }
}

/// In-memory stream channel created by [`LoopbackEngine`].
struct LoopbackStreamChannel {
    name: String,
    tx: broadcast::Sender<InboundEvent>,
    topics: Mutex<HashSet<String>>,
}

#[async_trait]
impl StreamChannel for LoopbackStreamChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn join(&self, _options: JoinOptions) -> Result<(), EngineError> {
        Ok(())
    }

    async fn leave(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn join_topic(&self, topic: &str, _qos: TopicQos) -> Result<(), EngineError> {
        let _ = self
            .topics
            .lock()
            .expect("loopback lock poisoned")
            .insert(topic.to_string());
        Ok(())
    }

    async fn leave_topic(&self, topic: &str) -> Result<(), EngineError> {
        let _ = self
            .topics
            .lock()
            .expect("loopback lock poisoned")
            .remove(topic);
        Ok(())
    }

    async fn subscribe_topic(&self, _topic: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn unsubscribe_topic(&self, _topic: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn publish_topic_message(
        &self,
        topic: &str,
        message: &str,
    ) -> Result<(), EngineError> {
        if !self
            .topics
            .lock()
            .expect("loopback lock poisoned")
            .contains(topic)
        {
            return Err(EngineError::new(
                ErrorCode::NotSubscribed,
                "publishTopicMessage",
                format!("topic {topic} not joined"),
            ));
        }
        // Echo back through the same topic.
        let _ = self.tx.send(InboundEvent::Message {
            channel: self.name.clone(),
            topic: Some(topic.to_string()),
            publisher: ECHO_USER.to_string(),
            content: message.to_string(),
        });
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
