//! OAuth client-credentials exchange against the Daraja token endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{MpesaError, MpesaResult};

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";

/// A freshly issued access token, lifetime left exactly as the gateway sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Option<String>,
}

/// Turns consumer credentials into an access token. One network call, no retries.
#[async_trait]
pub trait CredentialFetcher: Send + Sync {
    async fn fetch_token(&self) -> MpesaResult<TokenGrant>;
}

/// `base64(key:secret)` for the Basic authorization header.
pub fn basic_credentials(consumer_key: &str, consumer_secret: &str) -> String {
    STANDARD.encode(format!("{}:{}", consumer_key, consumer_secret))
}

/// Fetches tokens from `{base}/oauth/v1/generate`.
pub struct DarajaCredentialFetcher {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl DarajaCredentialFetcher {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }
}

#[async_trait]
impl CredentialFetcher for DarajaCredentialFetcher {
    async fn fetch_token(&self) -> MpesaResult<TokenGrant> {
        let url = self.token_url();
        debug!("Requesting Daraja access token from {}", url);

        let credentials = basic_credentials(&self.consumer_key, &self.consumer_secret);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Token request failed: {}", e);
                MpesaError::auth(format!("Token request failed: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read token response: {}", e);
            MpesaError::auth(format!("Failed to read token response: {}", e))
                .with_status(status.as_u16())
        })?;
        let body = parse_body(&text);

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(|b| {
                    string_field(b, "errorDescription").or_else(|| string_field(b, "error"))
                })
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Failed to get access token".to_string());
            error!("Daraja token endpoint returned {}: {}", status, message);
            return Err(MpesaError::auth(message)
                .with_status(status.as_u16())
                .with_body(body));
        }

        let access_token = body
            .as_ref()
            .and_then(|b| string_field(b, "access_token"))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                MpesaError::auth("Invalid token response: missing access_token")
                    .with_body(body.clone())
            })?;

        let expires_in = body.as_ref().and_then(|b| match b.get("expires_in") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });

        Ok(TokenGrant {
            access_token,
            expires_in,
        })
    }
}

/// Parsed JSON when possible, otherwise the raw text as a JSON string.
pub(crate) fn parse_body(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

pub(crate) fn string_field(body: &Value, field: &str) -> Option<String> {
    body.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn fetcher(base_url: String) -> DarajaCredentialFetcher {
        DarajaCredentialFetcher::new(Client::new(), base_url, "user", "pass")
    }

    #[test]
    fn test_basic_credentials_encoding() {
        let encoded = basic_credentials("user", "pass");
        assert_eq!(encoded, "dXNlcjpwYXNz");
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"user:pass");
    }

    #[tokio::test]
    async fn test_fetch_token_sends_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/oauth/v1/generate")
                    .query_param("grant_type", "client_credentials")
                    .header("Authorization", "Basic dXNlcjpwYXNz");
                then.status(200)
                    .json_body(json!({ "access_token": "abc", "expires_in": "3599" }));
            })
            .await;

        let grant = fetcher(server.base_url()).fetch_token().await.unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token, "abc");
        assert_eq!(grant.expires_in.as_deref(), Some("3599"));
    }

    #[tokio::test]
    async fn test_error_description_preferred_over_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth/v1/generate");
                then.status(400).json_body(json!({
                    "errorDescription": "Invalid credentials",
                    "error": "invalid_client"
                }));
            })
            .await;

        let err = fetcher(server.base_url()).fetch_token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(err.status_code, Some(400));
        assert_eq!(
            err.response_body.unwrap()["error"],
            json!("invalid_client")
        );
    }

    #[tokio::test]
    async fn test_status_text_used_when_body_unhelpful() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth/v1/generate");
                then.status(401).body("nope");
            })
            .await;

        let err = fetcher(server.base_url()).fetch_token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.message, "Unauthorized");
        assert_eq!(err.response_body, Some(json!("nope")));
    }

    #[tokio::test]
    async fn test_missing_access_token_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth/v1/generate");
                then.status(200).json_body(json!({ "expires_in": "3599" }));
            })
            .await;

        let err = fetcher(server.base_url()).fetch_token().await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.message.contains("missing access_token"));
        assert_eq!(err.response_body, Some(json!({ "expires_in": "3599" })));
    }

    #[tokio::test]
    async fn test_numeric_expires_in_is_kept_raw() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oauth/v1/generate");
                then.status(200)
                    .json_body(json!({ "access_token": "abc", "expires_in": 3600 }));
            })
            .await;

        let grant = fetcher(server.base_url()).fetch_token().await.unwrap();
        assert_eq!(grant.expires_in.as_deref(), Some("3600"));
    }

    #[tokio::test]
    async fn test_truncated_token_response_is_read_error() {
        let base_url = crate::payments::test_support::truncated_body_server().await;

        let err = fetcher(base_url).fetch_token().await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.message.starts_with("Failed to read token response"));
        assert_eq!(err.status_code, Some(200));
    }
}
