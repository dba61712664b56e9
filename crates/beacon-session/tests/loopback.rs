//! End-to-end flow over the in-memory loopback engine: login, subscribe,
//! publish, observe the echo, then tear down.

use std::sync::Arc;
use std::time::Duration;

use beacon_engine::loopback::{ECHO_USER, LoopbackEngine};
use beacon_engine::{ChannelFeature, EngineConfig, TopicQos};
use beacon_session::{
    Capability, MembershipManager, MembershipState, Session, SessionConfig, SessionState,
    spawn_router,
};

fn session() -> Arc<Session> {
    let engine = Arc::new(LoopbackEngine::new(EngineConfig::new("demo-app", "local")));
    Session::new(
        SessionConfig {
            app_id: "demo-app".into(),
            user_id: "local".into(),
            channel: "room1".into(),
            initial_token: None,
            capabilities: vec![
                Capability::Messaging,
                Capability::Presence,
                Capability::Storage,
                Capability::StreamTopics,
            ],
        },
        engine,
        None,
    )
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn login_subscribe_publish_echo_round_trip() {
    let session = session();
    let router = spawn_router(session.clone());
    let membership = MembershipManager::new(session.clone());

    session.login(None).await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    membership
        .subscribe("room1", &[ChannelFeature::Messages, ChannelFeature::Presence])
        .await
        .unwrap();
    assert_eq!(
        membership.membership("room1").map(|m| m.state),
        Some(MembershipState::Subscribed)
    );

    session.publish("room1", "hello").await.unwrap();

    // Local append is immediate; the echo arrives through the router.
    let shared = Arc::clone(session.shared());
    wait_until(|| shared.messages().len() == 2).await;
    let messages = shared.messages();
    assert_eq!(messages[0].sender, "local");
    assert_eq!(messages[0].text, "hello");
    assert_eq!(messages[1].sender, ECHO_USER);
    assert_eq!(messages[1].text, "hello");

    // The presence snapshot populated the roster, minus the local user.
    wait_until(|| shared.remote_users().contains_key(ECHO_USER)).await;
    assert!(!shared.remote_users().contains_key("local"));

    session.destroy().await;
    assert_eq!(session.state(), SessionState::Destroyed);
    router.abort();
}

#[tokio::test]
async fn connection_state_changes_flow_into_the_status_sink() {
    let session = session();
    let router = spawn_router(session.clone());

    session.login(None).await.unwrap();

    wait_until(|| {
        session.status().current().as_deref()
            == Some("Connection\nstate: connected\nreason: login success")
    })
    .await;

    session.destroy().await;
    router.abort();
}

#[tokio::test]
async fn stream_topic_round_trip_renders_topic_prefixed_messages() {
    let session = session();
    let router = spawn_router(session.clone());
    let membership = MembershipManager::new(session.clone());

    session.login(None).await.unwrap();
    membership.join_stream_channel("stream1").await.unwrap();
    membership.join_topic("chat", TopicQos::Ordered).await.unwrap();
    membership.subscribe_topic("chat").await.unwrap();

    membership.publish_topic("chat", "ping").await.unwrap();

    let shared = Arc::clone(session.shared());
    wait_until(|| shared.messages().len() == 2).await;
    let messages = shared.messages();
    assert_eq!(messages[0].text, "[chat]\nping");
    assert_eq!(messages[1].sender, ECHO_USER);
    assert_eq!(messages[1].text, "[chat]\nping");

    membership.leave_stream_channel().await.unwrap();
    assert!(shared.topics().is_empty());

    session.destroy().await;
    router.abort();
}

#[tokio::test]
async fn metadata_updates_surface_storage_notices() {
    let session = session();
    let router = spawn_router(session.clone());
    let mut notices = session.subscribe_storage_changes();

    session.login(None).await.unwrap();
    session
        .set_local_user_metadata(vec![beacon_engine::MetadataItem::new("mood", "good")])
        .await
        .unwrap();

    let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.subject, "local");

    let items = session.get_user_metadata("local").await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].key, "mood");

    session
        .set_local_user_state("room1", vec![beacon_engine::MetadataItem::new("st", "busy")])
        .await
        .unwrap();
    let state = session.get_user_state("room1", "local").await.unwrap();
    assert_eq!(state, vec![beacon_engine::MetadataItem::new("st", "busy")]);

    session.destroy().await;
    router.abort();
}
