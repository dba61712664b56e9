//! # beacon-auth
//!
//! Credential provider: fetches short-lived authentication tokens from a
//! remote token-issuing endpoint, given a user id and optional channel scope.
//!
//! This layer performs a single POST per call and never retries; retry policy
//! belongs to the caller (the connection session's refresh-once path). The
//! [`CredentialProvider`] trait is the seam the session is tested against.

#![deny(unsafe_code)]

pub mod errors;
pub mod provider;

pub use errors::TokenError;
pub use provider::{CredentialProvider, HttpCredentialProvider};
