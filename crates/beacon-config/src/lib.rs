//! # beacon-config
//!
//! Layered app configuration for Beacon demos.
//!
//! Configuration is loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AppConfig::default()`]
//! 2. **Config file**: a `config.json` (deep-merged over defaults)
//! 3. **Environment variables**: `BEACON_*` overrides (highest priority)
//!
//! The loaded value is returned to the caller and passed explicitly into
//! session construction. There is deliberately no process-wide singleton:
//! "current channel" and "current token" state used for retry diagnostics
//! lives on the session that owns it, never in a global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{ConfigError, Result};
pub use loader::{deep_merge, load_from_path};
pub use types::AppConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _config = AppConfig::default();
        let merged = deep_merge(
            serde_json::json!({"x": 1}),
            serde_json::json!({"y": 2}),
        );
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
