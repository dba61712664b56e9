//! Status sink.
//!
//! Holds at most one current human-readable status string; a new value
//! overwrites the previous one silently. The UI observes this sink instead of
//! catching errors. Display timeout (the original showed a toast for 5s) is a
//! presentation concern and stays outside the core.

use tokio::sync::watch;

/// Latest-value-wins status channel.
pub struct StatusSink {
    tx: watch::Sender<Option<String>>,
}

impl StatusSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Overwrite the current status.
    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(status = %message, "status updated");
        let _ = self.tx.send(Some(message));
    }

    /// Clear the current status.
    pub fn clear(&self) {
        let _ = self.tx.send(None);
    }

    /// The current status, if any.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Observe status changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for StatusSink {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
