//! HTTP transport for Daraja API calls.
//!
//! Every request carries a fresh bearer token from the [`AccessTokenProvider`]
//! and a JSON body; non-success responses become request errors.

use std::sync::Arc;

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::auth::fetcher::{parse_body, string_field};
use crate::auth::AccessTokenProvider;
use crate::error::{MpesaError, MpesaResult};

pub struct HttpTransport {
    client: Client,
    base_url: String,
    auth: Arc<AccessTokenProvider>,
}

impl HttpTransport {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        auth: Arc<AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Make an authenticated request to the Daraja API
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> MpesaResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        let token = self.auth.access_token().await?;

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("Daraja {} {}", method, url);

        let response = request.send().await.map_err(|e| {
            error!("Daraja request to {} failed: {}", url, e);
            MpesaError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read Daraja response from {}: {}", path, e);
            MpesaError::request(format!("Failed to read response body: {}", e))
                .with_status(status.as_u16())
        })?;
        let data = parse_body(&text);

        if !status.is_success() {
            let message = data
                .as_ref()
                .and_then(|d| {
                    string_field(d, "errorMessage").or_else(|| string_field(d, "error"))
                })
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Request failed".to_string());
            error!("Daraja API error {} on {}: {}", status, path, message);
            return Err(MpesaError::request(message)
                .with_status(status.as_u16())
                .with_body(data));
        }

        serde_json::from_value(data.clone().unwrap_or(Value::Null)).map_err(|e| {
            error!("Failed to parse Daraja response from {}: {}", path, e);
            MpesaError::request(format!("Invalid response format: {}", e))
                .with_status(status.as_u16())
                .with_body(data)
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> MpesaResult<T> {
        self.request::<Value, T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> MpesaResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialFetcher, TokenGrant};
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    struct StaticFetcher;

    #[async_trait]
    impl CredentialFetcher for StaticFetcher {
        async fn fetch_token(&self) -> MpesaResult<TokenGrant> {
            Ok(TokenGrant {
                access_token: "test-token".to_string(),
                expires_in: Some("3599".to_string()),
            })
        }
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        ok: bool,
    }

    fn transport(base_url: String) -> HttpTransport {
        let auth = Arc::new(AccessTokenProvider::new(Arc::new(StaticFetcher)));
        HttpTransport::new(Client::new(), base_url, auth)
    }

    #[test]
    fn test_url_for_normalizes_slashes() {
        let t = transport("https://sandbox.safaricom.co.ke/".to_string());
        assert_eq!(
            t.url_for("mpesa/b2c/v1/paymentrequest"),
            "https://sandbox.safaricom.co.ke/mpesa/b2c/v1/paymentrequest"
        );
        assert_eq!(
            t.url_for("/mpesa/b2c/v1/paymentrequest"),
            "https://sandbox.safaricom.co.ke/mpesa/b2c/v1/paymentrequest"
        );
    }

    #[tokio::test]
    async fn test_post_attaches_bearer_token_and_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/echo")
                    .header("Authorization", "Bearer test-token")
                    .json_body(json!({ "Amount": 10 }));
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let echo: Echo = transport(server.base_url())
            .post("/echo", &json!({ "Amount": 10 }))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(echo.ok);
    }

    #[tokio::test]
    async fn test_error_message_taken_from_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/fail");
                then.status(400).json_body(json!({
                    "requestId": "1",
                    "errorCode": "400.002.02",
                    "errorMessage": "Bad Request - Invalid Amount"
                }));
            })
            .await;

        let err = transport(server.base_url())
            .post::<_, Value>("/fail", &json!({}))
            .await
            .unwrap_err();

        assert!(err.is_request());
        assert_eq!(err.message, "Bad Request - Invalid Amount");
        assert_eq!(err.status_code, Some(400));
        assert_eq!(err.response_body.unwrap()["errorCode"], json!("400.002.02"));
    }

    #[tokio::test]
    async fn test_plain_text_error_falls_back_to_status_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/down");
                then.status(503).body("upstream unavailable");
            })
            .await;

        let err = transport(server.base_url())
            .get::<Value>("/down")
            .await
            .unwrap_err();

        assert_eq!(err.message, "Service Unavailable");
        assert_eq!(err.response_body, Some(json!("upstream unavailable")));
    }

    #[tokio::test]
    async fn test_truncated_body_is_request_error() {
        let base_url = crate::payments::test_support::truncated_body_server().await;

        let err = transport(base_url)
            .post::<_, Value>("/mpesa/accountbalance/v1/query", &json!({}))
            .await
            .unwrap_err();

        assert!(err.is_request());
        assert!(err.message.starts_with("Failed to read response body"));
        assert_eq!(err.status_code, Some(200));
    }
}
