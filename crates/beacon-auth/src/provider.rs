//! HTTP token provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TokenError;

/// Default timeout for a token request, so a dead endpoint cannot suspend
/// a login indefinitely.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of short-lived login tokens.
///
/// The channel scope is required only when requesting a token scoped to a
/// stream channel; message-channel logins pass `None`.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch a token for `user_id`, optionally scoped to `channel`.
    async fn fetch_token(
        &self,
        user_id: &str,
        channel: Option<&str>,
    ) -> Result<String, TokenError>;
}

/// Request body for the token endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    token_type: &'static str,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

/// Response body from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// [`CredentialProvider`] backed by an HTTP token endpoint.
///
/// Issues `POST {endpoint}` with body `{"tokenType":"rtm","uid":...}` and
/// expects `200 OK` with `{"token": "..."}`. Any other status or a malformed
/// body is a hard failure for that call.
#[derive(Debug)]
pub struct HttpCredentialProvider {
    endpoint: reqwest::Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCredentialProvider {
    /// Create a provider for the given endpoint URL.
    ///
    /// The URL is validated here; a malformed URL fails every subsequent
    /// fetch, so it is rejected up front.
    pub fn new(endpoint: &str) -> Result<Self, TokenError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| TokenError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    #[tracing::instrument(skip_all, fields(uid = user_id, channel))]
    async fn fetch_token(
        &self,
        user_id: &str,
        channel: Option<&str>,
    ) -> Result<String, TokenError> {
        let body = TokenRequest {
            token_type: "rtm",
            uid: user_id,
            channel,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TokenError::Timeout(self.timeout)
                } else {
                    TokenError::Network(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TokenError::Status {
                status: status.as_u16(),
            });
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| TokenError::Decode(e.to_string()))?;
        tracing::debug!("fetched fresh token");
        Ok(data.token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ok_response_yields_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(serde_json::json!({
                "tokenType": "rtm",
                "uid": "alice"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tok-123"
            })))
            .mount(&server)
            .await;

        let provider = HttpCredentialProvider::new(&server.uri()).unwrap();
        let token = provider.fetch_token("alice", None).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn channel_scope_is_sent_only_when_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "tokenType": "rtm",
                "uid": "alice",
                "channel": "room1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "scoped-tok"
            })))
            .mount(&server)
            .await;

        let provider = HttpCredentialProvider::new(&server.uri()).unwrap();
        let token = provider.fetch_token("alice", Some("room1")).await.unwrap();
        assert_eq!(token, "scoped-tok");
    }

    #[tokio::test]
    async fn wrong_field_name_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tok": "x"
            })))
            .mount(&server)
            .await;

        let provider = HttpCredentialProvider::new(&server.uri()).unwrap();
        let err = provider.fetch_token("alice", None).await.unwrap_err();
        assert_matches!(err, TokenError::Decode(_));
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = HttpCredentialProvider::new(&server.uri()).unwrap();
        let err = provider.fetch_token("alice", None).await.unwrap_err();
        assert_matches!(err, TokenError::Status { status: 403 });
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        // Bind then drop a listener so the port is known-dead.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let provider =
            HttpCredentialProvider::new(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = provider.fetch_token("alice", None).await.unwrap_err();
        assert_matches!(err, TokenError::Network(_));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let provider = HttpCredentialProvider::new(&server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = provider.fetch_token("alice", None).await.unwrap_err();
        assert_matches!(err, TokenError::Timeout(_));
    }

    #[test]
    fn malformed_endpoint_is_rejected_at_construction() {
        let err = HttpCredentialProvider::new("not a url").unwrap_err();
        assert_matches!(err, TokenError::InvalidEndpoint(_));
    }
}
