//! # beacon-core
//!
//! Foundation types for the Beacon signaling workspace.
//!
//! This crate provides the shared vocabulary the other Beacon crates depend on:
//!
//! - **Events** ([`events::InboundEvent`]): the tagged union of everything
//!   the signaling engine pushes at a session (messages, presence, storage,
//!   connection-state changes, token-expiry warnings)
//! - **Error codes** ([`codes::ErrorCode`]): the engine's error-code space,
//!   shared by login and subscribe failures upstream
//! - **Classification** ([`codes::classify`]): the single table mapping raw
//!   codes into recovery categories
//! - **Logging** ([`logging::init`]): tracing-subscriber setup for binaries
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other beacon crates.

#![deny(unsafe_code)]

pub mod codes;
pub mod events;
pub mod logging;
