//! Config loading: defaults, file deep-merge, env overrides.

use std::path::Path;

use serde_json::Value;

use crate::errors::Result;
use crate::types::AppConfig;

/// Env var overriding [`AppConfig::uid`].
pub const ENV_UID: &str = "BEACON_UID";
/// Env var overriding [`AppConfig::app_id`].
pub const ENV_APP_ID: &str = "BEACON_APP_ID";
/// Env var overriding [`AppConfig::channel`].
pub const ENV_CHANNEL: &str = "BEACON_CHANNEL";
/// Env var overriding [`AppConfig::token`].
pub const ENV_TOKEN: &str = "BEACON_TOKEN";
/// Env var overriding [`AppConfig::token_url`].
pub const ENV_TOKEN_URL: &str = "BEACON_TOKEN_URL";

/// Load configuration from a JSON file, layered over compiled defaults,
/// with `BEACON_*` env vars applied on top.
///
/// A missing file is not an error: defaults plus env overrides are returned,
/// with a warning logged.
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let defaults = serde_json::to_value(AppConfig::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&raw)?;
        deep_merge(defaults, file)
    } else {
        tracing::warn!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: AppConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);
    Ok(config.normalize())
}

/// Deep-merge `overlay` on top of `base`.
///
/// Objects merge recursively; any other value in `overlay` replaces the
/// corresponding value in `base` wholesale.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(uid) = std::env::var(ENV_UID) {
        config.uid = uid;
    }
    if let Ok(app_id) = std::env::var(ENV_APP_ID) {
        config.app_id = app_id;
    }
    if let Ok(channel) = std::env::var(ENV_CHANNEL) {
        config.channel = channel;
    }
    if let Ok(token) = std::env::var(ENV_TOKEN) {
        config.token = Some(token);
    }
    if let Ok(token_url) = std::env::var(ENV_TOKEN_URL) {
        config.token_url = token_url;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
