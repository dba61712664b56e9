//! Scripted engine and provider doubles for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beacon_auth::{CredentialProvider, TokenError};
use beacon_core::codes::ErrorCode;
use beacon_core::events::InboundEvent;
use beacon_engine::{
    ChannelFeature, EngineError, JoinOptions, MetadataItem, SignalingEngine, StreamChannel,
    TopicQos,
};
use tokio::sync::broadcast;

use crate::session::{Capability, Session, SessionConfig};

const EVENT_CAPACITY: usize = 64;

fn scripted_err(queue: &Mutex<VecDeque<EngineError>>) -> Result<(), EngineError> {
    match queue.lock().expect("script lock poisoned").pop_front() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Engine double driven by per-operation error scripts. Each queued error is
/// returned once; an empty queue means success.
pub struct ScriptedEngine {
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub renew_calls: AtomicUsize,
    pub released: AtomicBool,
    login_errs: Mutex<VecDeque<EngineError>>,
    subscribe_errs: Mutex<VecDeque<EngineError>>,
    unsubscribe_errs: Mutex<VecDeque<EngineError>>,
    publish_errs: Mutex<VecDeque<EngineError>>,
    login_delay: Mutex<Option<Duration>>,
    subscribe_delay: Mutex<Option<Duration>>,
    leave_fails: AtomicBool,
    leave_topic_fails: AtomicBool,
    last_login_token: Mutex<Option<String>>,
    last_renewed_token: Mutex<Option<String>>,
    events: Mutex<Option<broadcast::Sender<InboundEvent>>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            login_errs: Mutex::new(VecDeque::new()),
            subscribe_errs: Mutex::new(VecDeque::new()),
            unsubscribe_errs: Mutex::new(VecDeque::new()),
            publish_errs: Mutex::new(VecDeque::new()),
            login_delay: Mutex::new(None),
            subscribe_delay: Mutex::new(None),
            leave_fails: AtomicBool::new(false),
            leave_topic_fails: AtomicBool::new(false),
            last_login_token: Mutex::new(None),
            last_renewed_token: Mutex::new(None),
            events: Mutex::new(Some(tx)),
        }
    }

    pub fn push_login_err(&self, code: ErrorCode) {
        self.login_errs
            .lock()
            .expect("script lock poisoned")
            .push_back(EngineError::new(code, "login", "scripted failure"));
    }

    pub fn push_subscribe_err(&self, code: ErrorCode) {
        self.push_subscribe_err_with_reason(code, "scripted failure");
    }

    pub fn push_subscribe_err_with_reason(&self, code: ErrorCode, reason: &str) {
        self.subscribe_errs
            .lock()
            .expect("script lock poisoned")
            .push_back(EngineError::new(code, "subscribe", reason));
    }

    pub fn push_unsubscribe_err(&self, code: ErrorCode) {
        self.unsubscribe_errs
            .lock()
            .expect("script lock poisoned")
            .push_back(EngineError::new(code, "unsubscribe", "scripted failure"));
    }

    pub fn push_publish_err(&self, code: ErrorCode) {
        self.publish_errs
            .lock()
            .expect("script lock poisoned")
            .push_back(EngineError::new(code, "publish", "scripted failure"));
    }

    pub fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock().expect("script lock poisoned") = Some(delay);
    }

    pub fn set_subscribe_delay(&self, delay: Duration) {
        *self.subscribe_delay.lock().expect("script lock poisoned") = Some(delay);
    }

    pub fn fail_leave(&self) {
        self.leave_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_leave_topic(&self) {
        self.leave_topic_fails.store(true, Ordering::SeqCst);
    }

    pub fn last_login_token(&self) -> Option<String> {
        self.last_login_token
            .lock()
            .expect("script lock poisoned")
            .clone()
    }

    pub fn last_renewed_token(&self) -> Option<String> {
        self.last_renewed_token
            .lock()
            .expect("script lock poisoned")
            .clone()
    }

    pub fn emit(&self, event: InboundEvent) {
        if let Some(tx) = self.events.lock().expect("script lock poisoned").as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Drop the event sender so router tasks observe a closed stream.
    pub fn close_events(&self) {
        let _ = self.events.lock().expect("script lock poisoned").take();
    }
}

#[async_trait]
impl SignalingEngine for ScriptedEngine {
    async fn login(&self, token: Option<&str>) -> Result<(), EngineError> {
        let _ = self.login_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_login_token.lock().expect("script lock poisoned") =
            token.map(str::to_string);
        let delay = *self.login_delay.lock().expect("script lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted_err(&self.login_errs)
    }

    async fn logout(&self) -> Result<(), EngineError> {
        let _ = self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(
        &self,
        _channel: &str,
        _features: &[ChannelFeature],
    ) -> Result<(), EngineError> {
        let _ = self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.subscribe_delay.lock().expect("script lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted_err(&self.subscribe_errs)
    }

    async fn unsubscribe(&self, _channel: &str) -> Result<(), EngineError> {
        scripted_err(&self.unsubscribe_errs)
    }

    async fn publish(&self, _channel: &str, _message: &str) -> Result<(), EngineError> {
        scripted_err(&self.publish_errs)
    }

    async fn renew_token(&self, token: &str) -> Result<(), EngineError> {
        let _ = self.renew_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_renewed_token
            .lock()
            .expect("script lock poisoned") = Some(token.to_string());
        Ok(())
    }

    async fn create_stream_channel(
        &self,
        channel: &str,
    ) -> Result<Box<dyn StreamChannel>, EngineError> {
        Ok(Box::new(ScriptedStreamChannel {
            name: channel.to_string(),
            leave_fails: self.leave_fails.load(Ordering::SeqCst),
            leave_topic_fails: self.leave_topic_fails.load(Ordering::SeqCst),
        }))
    }

    async fn get_user_metadata(&self, _user_id: &str) -> Result<Vec<MetadataItem>, EngineError> {
        Ok(Vec::new())
    }

    async fn set_user_metadata(
        &self,
        _user_id: &str,
        _items: Vec<MetadataItem>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn remove_user_metadata(
        &self,
        _user_id: &str,
        _keys: Vec<String>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn get_channel_metadata(
        &self,
        _channel: &str,
    ) -> Result<Vec<MetadataItem>, EngineError> {
        Ok(Vec::new())
    }

    async fn get_online_users(&self, _channel: &str) -> Result<Vec<String>, EngineError> {
        Ok(Vec::new())
    }

    async fn get_state(
        &self,
        _channel: &str,
        _user_id: &str,
    ) -> Result<Vec<MetadataItem>, EngineError> {
        Ok(Vec::new())
    }

    async fn set_user_state(
        &self,
        _channel: &str,
        _items: Vec<MetadataItem>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<InboundEvent> {
        match self.events.lock().expect("script lock poisoned").as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.close_events();
    }
}

struct ScriptedStreamChannel {
    name: String,
    leave_fails: bool,
    leave_topic_fails: bool,
}

#[async_trait]
impl StreamChannel for ScriptedStreamChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn join(&self, _options: JoinOptions) -> Result<(), EngineError> {
        Ok(())
    }

    async fn leave(&self) -> Result<(), EngineError> {
        if self.leave_fails {
            Err(EngineError::new(
                ErrorCode::Unknown(-8),
                "leave",
                "scripted failure leaving stream channel",
            ))
        } else {
            Ok(())
        }
    }

    async fn join_topic(&self, _topic: &str, _qos: TopicQos) -> Result<(), EngineError> {
        Ok(())
    }

    async fn leave_topic(&self, topic: &str) -> Result<(), EngineError> {
        if self.leave_topic_fails {
            Err(EngineError::new(
                ErrorCode::Unknown(-9),
                "leaveTopic",
                format!("scripted failure leaving {topic}"),
            ))
        } else {
            Ok(())
        }
    }

    async fn subscribe_topic(&self, _topic: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn unsubscribe_topic(&self, _topic: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn publish_topic_message(
        &self,
        _topic: &str,
        _message: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Provider double counting fetches.
pub struct CountingProvider {
    pub calls: AtomicUsize,
    token: String,
    fails: bool,
    delay: Option<Duration>,
}

impl CountingProvider {
    pub fn ok(token: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            token: token.to_string(),
            fails: false,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            token: String::new(),
            fails: true,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CredentialProvider for CountingProvider {
    async fn fetch_token(
        &self,
        _user_id: &str,
        _channel: Option<&str>,
    ) -> Result<String, TokenError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails {
            Err(TokenError::Status { status: 500 })
        } else {
            Ok(self.token.clone())
        }
    }
}

/// Session over `engine` with every capability enabled, user `local`,
/// channel `room1`.
pub fn session_with(
    engine: Arc<ScriptedEngine>,
    provider: Option<Arc<CountingProvider>>,
) -> Arc<Session> {
    session_config_with(
        engine,
        provider,
        vec![
            Capability::Messaging,
            Capability::Presence,
            Capability::Storage,
            Capability::StreamTopics,
        ],
    )
}

/// Same as [`session_with`] but with one capability removed.
pub fn session_without_capability(
    engine: Arc<ScriptedEngine>,
    missing: Capability,
) -> Arc<Session> {
    let capabilities = [
        Capability::Messaging,
        Capability::Presence,
        Capability::Storage,
        Capability::StreamTopics,
    ]
    .into_iter()
    .filter(|capability| *capability != missing)
    .collect();
    session_config_with(engine, None, capabilities)
}

fn session_config_with(
    engine: Arc<ScriptedEngine>,
    provider: Option<Arc<CountingProvider>>,
    capabilities: Vec<Capability>,
) -> Arc<Session> {
    Session::new(
        SessionConfig {
            app_id: "test-app".into(),
            user_id: "local".into(),
            channel: "room1".into(),
            initial_token: None,
            capabilities,
        },
        engine,
        provider.map(|provider| provider as Arc<dyn CredentialProvider>),
    )
}
