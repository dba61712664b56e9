//! Channel membership.
//!
//! Tracks which message channels the session is subscribed to, runs the
//! subscribe retry-after-refresh recovery, and owns the session's stream
//! channel and topic set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use beacon_core::codes::ErrorClass;
use beacon_engine::{ChannelFeature, EngineError, JoinOptions, StreamChannel, TopicQos};

use crate::error::SessionError;
use crate::session::{Capability, Session};

/// Lifecycle of one channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipState {
    /// Not subscribed.
    Unsubscribed,
    /// Subscribe call in flight.
    Subscribing,
    /// Subscribed.
    Subscribed,
    /// Unsubscribe call in flight.
    Unsubscribing,
}

/// Tracked state of one channel.
#[derive(Clone, Debug)]
pub struct ChannelMembership {
    /// Channel name.
    pub channel: String,
    /// Features requested at subscribe time.
    pub features: Vec<ChannelFeature>,
    /// Current lifecycle state.
    pub state: MembershipState,
}

/// Manages message-channel subscriptions and the stream channel for one
/// session.
pub struct MembershipManager {
    session: Arc<Session>,
    channels: Mutex<HashMap<String, ChannelMembership>>,
    stream: tokio::sync::Mutex<Option<Box<dyn StreamChannel>>>,
}

impl MembershipManager {
    /// Create a manager bound to `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            channels: Mutex::new(HashMap::new()),
            stream: tokio::sync::Mutex::new(None),
        }
    }

    /// Membership record for `channel`, if tracked.
    pub fn membership(&self, channel: &str) -> Option<ChannelMembership> {
        self.channels
            .lock()
            .expect("membership lock poisoned")
            .get(channel)
            .cloned()
    }

    fn set_state(&self, channel: &str, features: &[ChannelFeature], state: MembershipState) {
        let mut channels = self.channels.lock().expect("membership lock poisoned");
        let _ = channels.insert(
            channel.to_string(),
            ChannelMembership {
                channel: channel.to_string(),
                features: features.to_vec(),
                state,
            },
        );
    }

    /// Translate a failed operation into the user-facing status line.
    fn report_failure(&self, operation: &str, err: &EngineError) {
        let status = match err.class() {
            ErrorClass::LoginFailure => {
                "could not log in, check your app ID and token".to_string()
            }
            ErrorClass::SubscribeFailure => "could not subscribe to channel".to_string(),
            ErrorClass::TokenInvalid | ErrorClass::Other => {
                format!("failed: {operation}\nreason: {}", err.reason)
            }
        };
        self.session.status().set(status);
    }

    /// Subscribe to a message channel.
    ///
    /// On a failure classified as invalid/expired token: report "fetching
    /// token", refresh and re-login through the session, and retry the
    /// subscribe exactly once. Only the failed subscribe is retried, not any
    /// surrounding login. A second failure is reported through the status
    /// sink and returned without another refresh.
    pub async fn subscribe(
        &self,
        channel: &str,
        features: &[ChannelFeature],
    ) -> Result<(), SessionError> {
        self.session.ensure_live()?;
        let observed = self.session.refresh_generation().await;
        self.set_state(channel, features, MembershipState::Subscribing);

        let result = self.session.engine().subscribe(channel, features).await;
        if self.session.ensure_live().is_err() {
            // Destroyed while the call was in flight.
            self.set_state(channel, features, MembershipState::Unsubscribed);
            return Err(SessionError::IllegalState("session destroyed"));
        }

        match result {
            Ok(()) => {
                self.set_state(channel, features, MembershipState::Subscribed);
                self.session.status().set("success");
                Ok(())
            }
            Err(err) if err.class() == ErrorClass::TokenInvalid => {
                self.session.status().set("fetching token");
                if let Err(recover_err) =
                    self.session.recover_auth(observed, Some(channel)).await
                {
                    self.set_state(channel, features, MembershipState::Unsubscribed);
                    self.session
                        .status()
                        .set("could not log in, check your app ID and token");
                    return Err(recover_err);
                }
                let retry = self.session.engine().subscribe(channel, features).await;
                if self.session.ensure_live().is_err() {
                    // Destroyed while the retried call was in flight.
                    self.set_state(channel, features, MembershipState::Unsubscribed);
                    return Err(SessionError::IllegalState("session destroyed"));
                }
                match retry {
                    Ok(()) => {
                        self.set_state(channel, features, MembershipState::Subscribed);
                        self.session.status().set("success");
                        Ok(())
                    }
                    Err(second) => {
                        self.set_state(channel, features, MembershipState::Unsubscribed);
                        self.report_failure("subscribe", &second);
                        Err(second.into())
                    }
                }
            }
            Err(err) => {
                self.set_state(channel, features, MembershipState::Unsubscribed);
                self.report_failure("subscribe", &err);
                Err(err.into())
            }
        }
    }

    /// Unsubscribe from a message channel.
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), SessionError> {
        self.session.ensure_live()?;
        let previous = self.membership(channel);
        let features = previous
            .as_ref()
            .map(|membership| membership.features.clone())
            .unwrap_or_default();
        self.set_state(channel, &features, MembershipState::Unsubscribing);
        match self.session.engine().unsubscribe(channel).await {
            Ok(()) => {
                self.set_state(channel, &features, MembershipState::Unsubscribed);
                Ok(())
            }
            Err(err) => {
                // The backend's view is unchanged; restore what was tracked
                // before, or nothing for a channel that never was.
                {
                    let mut channels =
                        self.channels.lock().expect("membership lock poisoned");
                    match previous {
                        Some(membership) => {
                            let _ = channels.insert(channel.to_string(), membership);
                        }
                        None => {
                            let _ = channels.remove(channel);
                        }
                    }
                }
                self.report_failure("unsubscribe", &err);
                Err(err.into())
            }
        }
    }

    // ── Stream channel ───────────────────────────────────────────────────

    /// Create and join a stream channel.
    ///
    /// Fetches a channel-scoped token when a provider is configured; joins
    /// tokenless otherwise. A join rejected for an invalid token goes through
    /// the same refresh-and-retry-once recovery as subscribe.
    pub async fn join_stream_channel(&self, channel: &str) -> Result<(), SessionError> {
        self.session.require_capability(Capability::StreamTopics)?;
        self.session.ensure_live()?;
        let observed = self.session.refresh_generation().await;
        let token = self.session.fetch_scoped_token(channel).await;

        let stream_channel = match self.session.engine().create_stream_channel(channel).await {
            Ok(stream_channel) => stream_channel,
            Err(err) => {
                self.session.status().set("creating stream channel failed");
                return Err(err.into());
            }
        };

        let options = JoinOptions {
            token,
            features: vec![ChannelFeature::Presence],
        };
        match stream_channel.join(options.clone()).await {
            Ok(()) => {
                *self.stream.lock().await = Some(stream_channel);
                self.session.status().set("success");
                Ok(())
            }
            Err(err) if err.class() == ErrorClass::TokenInvalid => {
                self.session.status().set("fetching token");
                self.session.recover_auth(observed, Some(channel)).await?;
                let retry_options = JoinOptions {
                    token: self.session.fetch_scoped_token(channel).await,
                    ..options
                };
                match stream_channel.join(retry_options).await {
                    Ok(()) => {
                        *self.stream.lock().await = Some(stream_channel);
                        self.session.status().set("success");
                        Ok(())
                    }
                    Err(second) => {
                        self.report_failure("join", &second);
                        Err(second.into())
                    }
                }
            }
            Err(err) => {
                self.report_failure("join", &err);
                Err(err.into())
            }
        }
    }

    /// Leave the stream channel, if joined. Clears the joined-topic set.
    ///
    /// On a failed leave the handle and the topic set are kept: the backend
    /// still has the channel joined, so the local view must not pretend
    /// otherwise.
    pub async fn leave_stream_channel(&self) -> Result<(), SessionError> {
        let mut stream = self.stream.lock().await;
        let Some(stream_channel) = stream.as_ref() else {
            return Ok(());
        };
        stream_channel.leave().await?;
        *stream = None;
        self.session.shared().clear_topics();
        Ok(())
    }

    /// Join a topic on the stream channel as a publisher.
    pub async fn join_topic(&self, topic: &str, qos: TopicQos) -> Result<(), SessionError> {
        let stream = self.stream.lock().await;
        let stream_channel = stream
            .as_ref()
            .ok_or(SessionError::IllegalState("stream channel not joined"))?;
        stream_channel.join_topic(topic, qos).await?;
        // Idempotent: a second join of the same topic leaves one entry.
        let _ = self.session.shared().add_topic(topic);
        Ok(())
    }

    /// Leave a topic. The topic stays tracked if the leave fails.
    pub async fn leave_topic(&self, topic: &str) -> Result<(), SessionError> {
        let stream = self.stream.lock().await;
        let stream_channel = stream
            .as_ref()
            .ok_or(SessionError::IllegalState("stream channel not joined"))?;
        stream_channel.leave_topic(topic).await?;
        self.session.shared().remove_topic(topic);
        Ok(())
    }

    /// Subscribe to a topic's messages.
    pub async fn subscribe_topic(&self, topic: &str) -> Result<(), SessionError> {
        let stream = self.stream.lock().await;
        let stream_channel = stream
            .as_ref()
            .ok_or(SessionError::IllegalState("stream channel not joined"))?;
        stream_channel.subscribe_topic(topic).await?;
        Ok(())
    }

    /// Stop receiving a topic's messages.
    pub async fn unsubscribe_topic(&self, topic: &str) -> Result<(), SessionError> {
        let stream = self.stream.lock().await;
        let stream_channel = stream
            .as_ref()
            .ok_or(SessionError::IllegalState("stream channel not joined"))?;
        stream_channel.unsubscribe_topic(topic).await?;
        Ok(())
    }

    /// Publish to a topic. Local history records it as `[topic]` plus the
    /// text, matching how remote topic messages render.
    pub async fn publish_topic(&self, topic: &str, text: &str) -> Result<(), SessionError> {
        let stream = self.stream.lock().await;
        let stream_channel = stream
            .as_ref()
            .ok_or(SessionError::IllegalState("stream channel not joined"))?;
        match stream_channel.publish_topic_message(topic, text).await {
            Ok(()) => {
                self.session.shared().push_message(
                    self.session.user_id().to_string(),
                    format!("[{topic}]\n{text}"),
                );
                Ok(())
            }
            Err(err) => {
                self.session
                    .status()
                    .set(format!("could not publish message: {}", err.reason));
                Err(err.into())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
