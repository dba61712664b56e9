//! Configuration types.

use serde::{Deserialize, Serialize};

/// Static app configuration for a demo session.
///
/// Field names follow the original `config.json` camelCase wire format.
/// Proxy and encryption values are passed through to the engine unchanged;
/// their semantics belong to the engine, not this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Local user id.
    pub uid: String,
    /// App id issued by the signaling backend console.
    pub app_id: String,
    /// Channel name to join.
    pub channel: String,
    /// Pre-issued login token. `None` for token-server or tokenless deployments.
    pub token: Option<String>,
    /// Payload encryption mode, 1-8. 0 disables encryption.
    pub encryption_mode: u8,
    /// Encryption salt.
    pub salt: String,
    /// Encryption cipher key.
    pub cipher_key: String,
    /// Cloud proxy server URL.
    pub proxy_url: String,
    /// Cloud proxy server port.
    pub proxy_port: String,
    /// Cloud proxy account.
    pub proxy_account: String,
    /// Cloud proxy password.
    pub proxy_password: String,
    /// Proxy type: "none", "tcp", "udp" or "http".
    pub proxy_type: String,
    /// Token generator endpoint URL. Empty when tokens are pre-issued.
    pub token_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            uid: String::new(),
            app_id: String::new(),
            channel: "test".to_string(),
            token: None,
            encryption_mode: 0,
            salt: String::new(),
            cipher_key: String::new(),
            proxy_url: String::new(),
            proxy_port: String::new(),
            proxy_account: String::new(),
            proxy_password: String::new(),
            proxy_type: "none".to_string(),
            token_url: String::new(),
        }
    }
}

impl AppConfig {
    /// Normalize loaded values: an empty-string token means no token.
    pub(crate) fn normalize(mut self) -> Self {
        if self.token.as_deref() == Some("") {
            self.token = None;
        }
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
