//! # beacon-engine
//!
//! The signaling-engine seam. The engine is an external collaborator that
//! performs the actual network I/O; this crate defines the traits a session
//! drives it through ([`SignalingEngine`], [`StreamChannel`]), the
//! configuration passed at engine construction (proxy and encryption values
//! are passed through unchanged), and [`loopback::LoopbackEngine`], an
//! in-process implementation used by the demo binary and tests.
//!
//! Engine failures carry a code from the shared error-code space in
//! `beacon-core`; the session layer classifies them, this crate does not.

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod loopback;
pub mod types;

pub use engine::{SignalingEngine, StreamChannel};
pub use error::EngineError;
pub use types::{
    ChannelFeature, EncryptionConfig, EngineConfig, JoinOptions, MetadataItem, ProxyConfig,
    TopicQos,
};
