//! # beacon-cli
//!
//! Demo binary: wires a session over the in-memory loopback engine, walks
//! through login, subscribe, and publish, and prints the observed message
//! history and roster.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_auth::{CredentialProvider, HttpCredentialProvider};
use beacon_config::AppConfig;
use beacon_engine::loopback::LoopbackEngine;
use beacon_engine::{
    ChannelFeature, EncryptionConfig, EngineConfig, ProxyConfig, SignalingEngine,
};
use beacon_session::{Capability, MembershipManager, Session, SessionConfig, spawn_router};
use clap::Parser;

/// Beacon signaling demo.
#[derive(Parser, Debug)]
#[command(name = "beacon", about = "Beacon signaling demo")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Channel to subscribe to (overrides the config file).
    #[arg(long)]
    channel: Option<String>,

    /// Local user id (overrides the config file).
    #[arg(long)]
    user: Option<String>,

    /// Messages to publish after subscribing. May be repeated.
    #[arg(long = "message", default_value = "hello from beacon")]
    messages: Vec<String>,
}

/// Translate app configuration into the engine's construction config.
fn engine_config(config: &AppConfig) -> Result<EngineConfig> {
    let proxy = if config.proxy_url.is_empty() {
        None
    } else {
        let port: u16 = config
            .proxy_port
            .parse()
            .with_context(|| format!("invalid proxy port: {}", config.proxy_port))?;
        Some(ProxyConfig {
            proxy_type: config.proxy_type.clone(),
            server: config.proxy_url.clone(),
            port,
            account: (!config.proxy_account.is_empty()).then(|| config.proxy_account.clone()),
            password: (!config.proxy_password.is_empty()).then(|| config.proxy_password.clone()),
        })
    };

    let encryption = (config.encryption_mode > 0).then(|| EncryptionConfig {
        mode: config.encryption_mode,
        cipher_key: config.cipher_key.clone(),
        salt: config.salt.clone(),
    });

    let mut engine = EngineConfig::new(&config.app_id, &config.uid);
    engine.proxy = proxy;
    engine.encryption = encryption;
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    beacon_core::logging::init("info");
    let args = Cli::parse();

    let mut config = beacon_config::load_from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(channel) = args.channel {
        config.channel = channel;
    }
    if let Some(user) = args.user {
        config.uid = user;
    }

    let provider: Option<Arc<dyn CredentialProvider>> = if config.token_url.is_empty() {
        None
    } else {
        let provider = HttpCredentialProvider::new(&config.token_url)
            .with_context(|| format!("invalid token endpoint: {}", config.token_url))?;
        Some(Arc::new(provider))
    };

    let engine: Arc<dyn SignalingEngine> =
        Arc::new(LoopbackEngine::new(engine_config(&config)?));
    let session = Session::new(
        SessionConfig::from_app_config(
            &config,
            vec![
                Capability::Messaging,
                Capability::Presence,
                Capability::Storage,
                Capability::StreamTopics,
            ],
        ),
        engine,
        provider,
    );
    let router = spawn_router(session.clone());
    let membership = MembershipManager::new(session.clone());

    // Mirror status changes to the terminal as they happen.
    let mut status_rx = session.status().subscribe();
    let status_task = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            if let Some(status) = status_rx.borrow_and_update().clone() {
                println!("status: {status}");
            }
        }
    });

    let channel = session.config().channel.clone();
    session.login(None).await.context("login failed")?;
    membership
        .subscribe(&channel, &[ChannelFeature::Messages, ChannelFeature::Presence])
        .await
        .context("subscribe failed")?;

    for message in &args.messages {
        session
            .publish(&channel, message)
            .await
            .with_context(|| format!("publish failed: {message}"))?;
    }

    // Give the router a moment to apply the echoed messages.
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("--- message history ---");
    for message in session.shared().messages() {
        println!("{}: {}", message.sender, message.text);
    }
    println!("--- online users ---");
    for user in session.shared().remote_users().keys() {
        println!("{user}");
    }

    session.destroy().await;
    router.abort();
    status_task.abort();
    tracing::info!("session destroyed, exiting");
    Ok(())
}
