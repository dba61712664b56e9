//! Connection session.
//!
//! One [`Session`] per logical user identity. The session exclusively owns
//! its engine handle, drives login/logout, and implements the
//! refresh-once-then-retry recovery for invalid or expired tokens.
//!
//! State machine: `Disconnected → LoggingIn → Connected → Disconnected`,
//! with `LoggingIn → RefreshingToken → LoggingIn` as the sub-path taken on a
//! token failure. `Destroyed` is terminal; operations on a destroyed session
//! fail with [`SessionError::IllegalState`] rather than touch released
//! resources.

use std::sync::{Arc, Mutex};

use beacon_auth::CredentialProvider;
use beacon_config::AppConfig;
use beacon_core::codes::ErrorClass;
use beacon_core::events::{StorageEventType, StorageType};
use beacon_engine::{MetadataItem, SignalingEngine};
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::router::StorageNotice;
use crate::state::SharedState;
use crate::status::StatusSink;

/// Buffer size for storage-change notifications.
const STORAGE_NOTICE_CAPACITY: usize = 64;

/// Feature set a session is constructed with.
///
/// Capabilities replace the original's manager-subclass hierarchy: one
/// session type, with optional feature modules selected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Publish and receive channel messages.
    Messaging,
    /// Roster and per-user state.
    Presence,
    /// User/channel metadata.
    Storage,
    /// Stream channels with topics.
    StreamTopics,
}

/// Configuration for one session.
///
/// Passed explicitly at construction; a session never consults global state.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// App id issued by the signaling backend.
    pub app_id: String,
    /// Local user id.
    pub user_id: String,
    /// Channel this session is about to work with. Used as the token scope
    /// for login-path refreshes.
    pub channel: String,
    /// Pre-issued login token, if any.
    pub initial_token: Option<String>,
    /// Features enabled for this session.
    pub capabilities: Vec<Capability>,
}

impl SessionConfig {
    /// Build a session config from loaded app configuration.
    pub fn from_app_config(config: &AppConfig, capabilities: Vec<Capability>) -> Self {
        Self {
            app_id: config.app_id.clone(),
            user_id: config.uid.clone(),
            channel: config.channel.clone(),
            initial_token: config.token.clone(),
            capabilities,
        }
    }
}

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not logged in.
    Disconnected,
    /// Login attempt in flight.
    LoggingIn,
    /// Token refresh in flight after a token failure.
    RefreshingToken,
    /// Logged in.
    Connected,
    /// Torn down. Terminal.
    Destroyed,
}

/// Serializes token refreshes: at most one fetch in flight per session.
struct RefreshGuard {
    /// Bumped after every successful refresh. An operation that failed at
    /// generation N refreshes only if the generation is still N by the time
    /// it acquires the guard; otherwise it reuses the already-fresh token.
    generation: u64,
}

/// A logical connection to the signaling backend for one user identity.
pub struct Session {
    config: SessionConfig,
    engine: Arc<dyn SignalingEngine>,
    provider: Option<Arc<dyn CredentialProvider>>,
    state: Mutex<SessionState>,
    token: Mutex<Option<String>>,
    refresh: tokio::sync::Mutex<RefreshGuard>,
    shared: Arc<SharedState>,
    status: StatusSink,
    storage_tx: broadcast::Sender<StorageNotice>,
}

impl Session {
    /// Create a session owning `engine`, optionally able to fetch fresh
    /// tokens through `provider`.
    pub fn new(
        config: SessionConfig,
        engine: Arc<dyn SignalingEngine>,
        provider: Option<Arc<dyn CredentialProvider>>,
    ) -> Arc<Self> {
        let initial_token = config.initial_token.clone();
        let (storage_tx, _) = broadcast::channel(STORAGE_NOTICE_CAPACITY);
        Arc::new(Self {
            config,
            engine,
            provider,
            state: Mutex::new(SessionState::Disconnected),
            token: Mutex::new(initial_token),
            refresh: tokio::sync::Mutex::new(RefreshGuard { generation: 0 }),
            shared: Arc::new(SharedState::new()),
            status: StatusSink::new(),
            storage_tx,
        })
    }

    /// Local user id.
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The engine handle this session owns.
    pub fn engine(&self) -> &Arc<dyn SignalingEngine> {
        &self.engine
    }

    /// Observable state (message history, roster, topics, logged-in flag).
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// The status sink.
    pub fn status(&self) -> &StatusSink {
        &self.status
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session lock poisoned")
    }

    /// Observe storage-change notifications.
    pub fn subscribe_storage_changes(&self) -> broadcast::Receiver<StorageNotice> {
        self.storage_tx.subscribe()
    }

    pub(crate) fn notify_storage(
        &self,
        subject: String,
        event_type: StorageEventType,
        storage_type: StorageType,
    ) {
        let _ = self.storage_tx.send(StorageNotice {
            subject,
            event_type,
            storage_type,
        });
    }

    /// Fail unless the session is still usable.
    pub(crate) fn ensure_live(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Destroyed {
            Err(SessionError::IllegalState("session destroyed"))
        } else {
            Ok(())
        }
    }

    fn require(&self, capability: Capability) -> Result<(), SessionError> {
        if self.config.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(SessionError::CapabilityDisabled(capability))
        }
    }

    /// Move to `next` unless the session was destroyed in the meantime.
    fn transition(&self, next: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.lock().expect("session lock poisoned");
        if *state == SessionState::Destroyed {
            return Err(SessionError::IllegalState("session destroyed"));
        }
        *state = next;
        Ok(())
    }

    /// The refresh generation an operation should record before calling the
    /// engine, so a later recovery can tell whether another task already
    /// refreshed the token.
    pub(crate) async fn refresh_generation(&self) -> u64 {
        self.refresh.lock().await.generation
    }

    /// Log in, optionally presenting a fresh token first.
    ///
    /// On a failure classified as invalid/expired token, fetches a fresh
    /// token once and retries the login exactly once. A second auth failure
    /// propagates; a failed refresh aborts the retry and surfaces the
    /// original auth error. Any other failure propagates immediately.
    pub async fn login(&self, token: Option<String>) -> Result<(), SessionError> {
        // Check-and-set in one critical section, before any await: a second
        // concurrent login must observe LoggingIn and be rejected here.
        {
            let mut state = self.state.lock().expect("session lock poisoned");
            match *state {
                SessionState::Destroyed => {
                    return Err(SessionError::IllegalState("session destroyed"));
                }
                SessionState::LoggingIn | SessionState::RefreshingToken => {
                    return Err(SessionError::IllegalState("login already in progress"));
                }
                SessionState::Disconnected | SessionState::Connected => {
                    *state = SessionState::LoggingIn;
                }
            }
        }
        if let Some(token) = token {
            *self.token.lock().expect("session lock poisoned") = Some(token);
        }

        let observed = self.refresh_generation().await;
        let current = self.token.lock().expect("session lock poisoned").clone();

        match self.engine.login(current.as_deref()).await {
            Ok(()) => self.complete_login(),
            Err(err) if err.class() == ErrorClass::TokenInvalid => {
                tracing::info!(code = ?err.code, "login token rejected, refreshing");
                self.transition(SessionState::RefreshingToken)?;
                let scope = (!self.config.channel.is_empty())
                    .then_some(self.config.channel.as_str());
                match self.refresh_token(observed, scope).await {
                    Ok(fresh) => {
                        self.transition(SessionState::LoggingIn)?;
                        match self.engine.login(Some(&fresh)).await {
                            Ok(()) => self.complete_login(),
                            Err(second) => {
                                let _ = self.transition(SessionState::Disconnected);
                                Err(second.into())
                            }
                        }
                    }
                    Err(refresh_err) => {
                        tracing::warn!(
                            error = %refresh_err,
                            "token refresh failed, surfacing original auth error"
                        );
                        let _ = self.transition(SessionState::Disconnected);
                        Err(err.into())
                    }
                }
            }
            Err(err) => {
                let _ = self.transition(SessionState::Disconnected);
                Err(err.into())
            }
        }
    }

    fn complete_login(&self) -> Result<(), SessionError> {
        self.transition(SessionState::Connected)?;
        self.shared.set_logged_in(true);
        Ok(())
    }

    /// Refresh the stored token, serialized per session.
    ///
    /// `observed_generation` is the generation the caller recorded before its
    /// operation failed. If another task has refreshed since, the stored
    /// token is reused instead of issuing a second fetch: the first failure
    /// triggers the fetch, later failures wait and piggyback on it.
    async fn refresh_token(
        &self,
        observed_generation: u64,
        channel: Option<&str>,
    ) -> Result<String, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::NoProvider)?;
        let mut guard = self.refresh.lock().await;
        if guard.generation > observed_generation {
            if let Some(token) = self.token.lock().expect("session lock poisoned").clone() {
                return Ok(token);
            }
        }

        let token = provider
            .fetch_token(&self.config.user_id, channel)
            .await?;
        *self.token.lock().expect("session lock poisoned") = Some(token.clone());
        guard.generation += 1;
        Ok(token)
    }

    /// Refresh the token and log in again, once.
    ///
    /// Used by membership recovery after a subscribe failed with an invalid
    /// token: refresh (scoped to the failing channel), re-login, and let the
    /// caller re-attempt its original call. No second refresh is attempted if
    /// this login fails.
    pub async fn recover_auth(
        &self,
        observed_generation: u64,
        channel: Option<&str>,
    ) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.transition(SessionState::RefreshingToken)?;
        let token = match self.refresh_token(observed_generation, channel).await {
            Ok(token) => token,
            Err(err) => {
                let _ = self.transition(SessionState::Disconnected);
                return Err(err);
            }
        };
        self.transition(SessionState::LoggingIn)?;
        match self.engine.login(Some(&token)).await {
            Ok(()) => self.complete_login(),
            Err(err) => {
                let _ = self.transition(SessionState::Disconnected);
                Err(err.into())
            }
        }
    }

    /// Log out of the signaling backend.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.engine.logout().await?;
        self.transition(SessionState::Disconnected)?;
        self.shared.set_logged_in(false);
        Ok(())
    }

    /// Publish a message to a message channel.
    ///
    /// On success the message is appended to the local history with the
    /// local user as sender.
    pub async fn publish(&self, channel: &str, text: &str) -> Result<(), SessionError> {
        self.require(Capability::Messaging)?;
        self.ensure_live()?;
        match self.engine.publish(channel, text).await {
            Ok(()) => {
                self.shared.push_message(self.config.user_id.clone(), text);
                Ok(())
            }
            Err(err) => {
                self.status.set("could not publish message");
                Err(err.into())
            }
        }
    }

    /// Tear the session down: best-effort logout, then release the engine.
    ///
    /// Idempotent, and safe to call while other operations are in flight;
    /// they observe the destroyed state and fail with `IllegalState`.
    pub async fn destroy(&self) {
        {
            let mut state = self.state.lock().expect("session lock poisoned");
            if *state == SessionState::Destroyed {
                return;
            }
            *state = SessionState::Destroyed;
        }
        if let Err(err) = self.engine.logout().await {
            tracing::debug!(error = %err, "logout during destroy failed");
        }
        self.engine.release();
        self.shared.set_logged_in(false);
    }

    /// Proactively renew the token ahead of expiry.
    ///
    /// Failures are logged, not surfaced: if proactive renewal fails, the
    /// next natural auth failure re-enters the refresh-and-retry path.
    pub(crate) async fn renew_token_proactively(&self) {
        let observed = self.refresh_generation().await;
        let scope = (!self.config.channel.is_empty()).then_some(self.config.channel.as_str());
        match self.refresh_token(observed, scope).await {
            Ok(token) => {
                if let Err(err) = self.engine.renew_token(&token).await {
                    tracing::warn!(error = %err, "engine rejected renewed token");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "proactive token renewal failed");
            }
        }
    }

    /// Try to fetch a channel-scoped token; `None` when no provider is
    /// configured or the fetch fails (tokenless deployments join without).
    pub(crate) async fn fetch_scoped_token(&self, channel: &str) -> Option<String> {
        let provider = self.provider.as_ref()?;
        match provider.fetch_token(&self.config.user_id, Some(channel)).await {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::debug!(error = %err, channel, "scoped token fetch failed, joining without");
                None
            }
        }
    }

    // ── Storage passthrough ──────────────────────────────────────────────

    /// Merge metadata onto the local user.
    pub async fn set_local_user_metadata(
        &self,
        items: Vec<MetadataItem>,
    ) -> Result<(), SessionError> {
        self.require(Capability::Storage)?;
        self.ensure_live()?;
        self.engine
            .set_user_metadata(&self.config.user_id, items)
            .await?;
        Ok(())
    }

    /// Fetch a user's metadata. Always re-fetched, never cached.
    pub async fn get_user_metadata(
        &self,
        user_id: &str,
    ) -> Result<Vec<MetadataItem>, SessionError> {
        self.require(Capability::Storage)?;
        self.ensure_live()?;
        Ok(self.engine.get_user_metadata(user_id).await?)
    }

    /// Remove keys from the local user's metadata.
    pub async fn remove_local_user_metadata(
        &self,
        keys: Vec<String>,
    ) -> Result<(), SessionError> {
        self.require(Capability::Storage)?;
        self.ensure_live()?;
        self.engine
            .remove_user_metadata(&self.config.user_id, keys)
            .await?;
        Ok(())
    }

    /// Fetch a channel's metadata.
    pub async fn get_channel_metadata(
        &self,
        channel: &str,
    ) -> Result<Vec<MetadataItem>, SessionError> {
        self.require(Capability::Storage)?;
        self.ensure_live()?;
        Ok(self.engine.get_channel_metadata(channel).await?)
    }

    // ── Presence passthrough ─────────────────────────────────────────────

    /// List users currently online in a channel.
    pub async fn get_online_users(&self, channel: &str) -> Result<Vec<String>, SessionError> {
        self.require(Capability::Presence)?;
        self.ensure_live()?;
        Ok(self.engine.get_online_users(channel).await?)
    }

    /// Fetch a user's presence state in a channel. Always re-fetched.
    pub async fn get_user_state(
        &self,
        channel: &str,
        user_id: &str,
    ) -> Result<Vec<MetadataItem>, SessionError> {
        self.require(Capability::Presence)?;
        self.ensure_live()?;
        Ok(self.engine.get_state(channel, user_id).await?)
    }

    /// Set the local user's presence state in a channel.
    pub async fn set_local_user_state(
        &self,
        channel: &str,
        items: Vec<MetadataItem>,
    ) -> Result<(), SessionError> {
        self.require(Capability::Presence)?;
        self.ensure_live()?;
        self.engine.set_user_state(channel, items).await?;
        Ok(())
    }

    pub(crate) fn require_capability(&self, capability: Capability) -> Result<(), SessionError> {
        self.require(capability)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
