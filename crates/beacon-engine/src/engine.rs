//! Engine traits.
//!
//! Every method is a suspension point: callers must tolerate arbitrary delay
//! and must not assume ordering between two concurrently issued calls on the
//! same engine unless they serialize the calls themselves.

use async_trait::async_trait;
use beacon_core::events::InboundEvent;
use tokio::sync::broadcast;

use crate::error::EngineError;
use crate::types::{ChannelFeature, JoinOptions, MetadataItem, TopicQos};

/// The external signaling engine a session drives.
///
/// Inbound events are exposed as an explicit broadcast stream rather than
/// delegate callbacks: [`SignalingEngine::subscribe_events`] returns a
/// receiver the session's event router consumes.
#[async_trait]
pub trait SignalingEngine: Send + Sync {
    /// Log in, optionally presenting a token.
    async fn login(&self, token: Option<&str>) -> Result<(), EngineError>;

    /// Log out.
    async fn logout(&self) -> Result<(), EngineError>;

    /// Subscribe to a message channel with the given features.
    async fn subscribe(
        &self,
        channel: &str,
        features: &[ChannelFeature],
    ) -> Result<(), EngineError>;

    /// Unsubscribe from a message channel.
    async fn unsubscribe(&self, channel: &str) -> Result<(), EngineError>;

    /// Publish a message to a message channel.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), EngineError>;

    /// Replace the login token before it expires.
    async fn renew_token(&self, token: &str) -> Result<(), EngineError>;

    /// Create a stream channel handle. The channel is not joined yet.
    async fn create_stream_channel(
        &self,
        channel: &str,
    ) -> Result<Box<dyn StreamChannel>, EngineError>;

    /// Fetch a user's metadata.
    async fn get_user_metadata(&self, user_id: &str) -> Result<Vec<MetadataItem>, EngineError>;

    /// Set (merge) a user's metadata.
    async fn set_user_metadata(
        &self,
        user_id: &str,
        items: Vec<MetadataItem>,
    ) -> Result<(), EngineError>;

    /// Remove the given keys from a user's metadata.
    async fn remove_user_metadata(
        &self,
        user_id: &str,
        keys: Vec<String>,
    ) -> Result<(), EngineError>;

    /// Fetch a channel's metadata.
    async fn get_channel_metadata(&self, channel: &str) -> Result<Vec<MetadataItem>, EngineError>;

    /// List the users currently online in a channel.
    async fn get_online_users(&self, channel: &str) -> Result<Vec<String>, EngineError>;

    /// Fetch a user's presence state in a channel.
    async fn get_state(
        &self,
        channel: &str,
        user_id: &str,
    ) -> Result<Vec<MetadataItem>, EngineError>;

    /// Set the local user's presence state in a channel.
    async fn set_user_state(
        &self,
        channel: &str,
        items: Vec<MetadataItem>,
    ) -> Result<(), EngineError>;

    /// Subscribe to the engine's inbound event stream.
    fn subscribe_events(&self) -> broadcast::Receiver<InboundEvent>;

    /// Release the engine's underlying resources. Idempotent; called once the
    /// owning session is destroyed.
    fn release(&self);
}

/// A stream channel created by [`SignalingEngine::create_stream_channel`].
#[async_trait]
pub trait StreamChannel: Send + Sync {
    /// Channel name.
    fn name(&self) -> &str;

    /// Join the stream channel.
    async fn join(&self, options: JoinOptions) -> Result<(), EngineError>;

    /// Leave the stream channel.
    async fn leave(&self) -> Result<(), EngineError>;

    /// Join a topic for publishing.
    async fn join_topic(&self, topic: &str, qos: TopicQos) -> Result<(), EngineError>;

    /// Leave a previously joined topic.
    async fn leave_topic(&self, topic: &str) -> Result<(), EngineError>;

    /// Subscribe to a topic's messages.
    async fn subscribe_topic(&self, topic: &str) -> Result<(), EngineError>;

    /// Unsubscribe from a topic's messages.
    async fn unsubscribe_topic(&self, topic: &str) -> Result<(), EngineError>;

    /// Publish a message into a topic.
    async fn publish_topic_message(&self, topic: &str, message: &str)
    -> Result<(), EngineError>;
}
