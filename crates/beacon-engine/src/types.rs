//! Engine configuration and call parameter types.

/// Channel features a subscription can opt into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelFeature {
    /// Receive message events.
    Messages,
    /// Receive presence events.
    Presence,
    /// Receive storage (metadata) events.
    Metadata,
}

/// Delivery guarantee for a stream-channel topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicQos {
    /// Messages delivered in publish order.
    Ordered,
    /// Messages delivered as they arrive.
    Unordered,
}

/// Options for joining a stream channel.
#[derive(Clone, Debug, Default)]
pub struct JoinOptions {
    /// Channel-scoped token, when the deployment requires one.
    pub token: Option<String>,
    /// Features to enable on the joined channel.
    pub features: Vec<ChannelFeature>,
}

/// A single key-value metadata entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataItem {
    /// Metadata key.
    pub key: String,
    /// Metadata value.
    pub value: String,
}

impl MetadataItem {
    /// Create a metadata item.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Cloud proxy parameters, passed through to the engine unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy transport type, e.g. "http", "tcp", "udp".
    pub proxy_type: String,
    /// Proxy server host.
    pub server: String,
    /// Proxy server port.
    pub port: u16,
    /// Proxy account, when the proxy requires authentication.
    pub account: Option<String>,
    /// Proxy password, when the proxy requires authentication.
    pub password: Option<String>,
}

/// Payload encryption parameters, passed through to the engine unchanged.
///
/// The mode is the backend's numeric encryption scheme selector (1-8);
/// interpreting it is the engine's business.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionConfig {
    /// Numeric encryption mode.
    pub mode: u8,
    /// Cipher key.
    pub cipher_key: String,
    /// Salt.
    pub salt: String,
}

/// Configuration handed to the engine at construction.
///
/// One engine instance is exclusively owned by one session; no two sessions
/// share an engine.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// App id issued by the signaling backend.
    pub app_id: String,
    /// Local user id.
    pub user_id: String,
    /// Cloud proxy settings, when connecting through a restricted network.
    pub proxy: Option<ProxyConfig>,
    /// Payload encryption settings.
    pub encryption: Option<EncryptionConfig>,
}

impl EngineConfig {
    /// Minimal config with just identity.
    pub fn new(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: user_id.into(),
            proxy: None,
            encryption: None,
        }
    }
}
