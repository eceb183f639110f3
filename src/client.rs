//! Single entry point for Daraja API operations.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::auth::{AccessTokenProvider, DarajaCredentialFetcher};
use crate::config::{Environment, MpesaConfig, ResolvedConfig};
use crate::error::{MpesaError, MpesaResult};
use crate::payments::{
    AccountApi, B2cApi, C2bApi, Initiator, StkApi, StkPushRequest, StkPushResult,
    StkQueryRequest, StkQueryResponse, TransactionApi,
};
use crate::transport::HttpTransport;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// M-Pesa client. OAuth is handled internally: tokens are cached and
/// refreshed shortly before expiry.
///
/// ```no_run
/// # async fn run() -> mpesa_daraja::MpesaResult<()> {
/// use mpesa_daraja::{Mpesa, MpesaConfig, StkPushRequest};
///
/// let mpesa = Mpesa::new(MpesaConfig::new("key", "secret").short_code("174379").pass_key("..."))?;
/// let result = mpesa
///     .stk_push(&StkPushRequest {
///         phone_number: "254708374149".into(),
///         amount: 10.0,
///         callback_url: "https://example.com/mpesa/stk".into(),
///         account_reference: "order-123".into(),
///         transaction_desc: "Payment".into(),
///         ..Default::default()
///     })
///     .await?;
/// println!("{}", result.response.checkout_request_id);
/// # Ok(())
/// # }
/// ```
pub struct Mpesa {
    environment: Environment,
    auth: Arc<AccessTokenProvider>,
    stk: StkApi,
    pub c2b: C2bApi,
    pub b2c: B2cApi,
    pub account: AccountApi,
    pub transaction: TransactionApi,
}

impl Mpesa {
    /// Resolve `config` against the environment and build the client.
    pub fn new(config: MpesaConfig) -> MpesaResult<Self> {
        Self::from_resolved(config.resolve()?)
    }

    pub fn from_resolved(config: ResolvedConfig) -> MpesaResult<Self> {
        let base_url = config.environment.base_url();
        Self::with_base_url(config, base_url)
    }

    /// Like [`Mpesa::from_resolved`] but against an arbitrary host (a proxy or a mock).
    pub fn with_base_url(config: ResolvedConfig, base_url: impl Into<String>) -> MpesaResult<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MpesaError::request(format!("Failed to create HTTP client: {}", e)))?;

        let fetcher = DarajaCredentialFetcher::new(
            client.clone(),
            base_url.clone(),
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
        );
        let auth = Arc::new(AccessTokenProvider::new(Arc::new(fetcher)));
        let transport = Arc::new(HttpTransport::new(client, base_url, auth.clone()));
        let initiator = Initiator::from_config(&config);

        info!("M-Pesa client ready ({})", config.environment);

        Ok(Self {
            environment: config.environment,
            auth,
            stk: StkApi::new(transport.clone(), &config.short_code, &config.pass_key),
            c2b: C2bApi::new(transport.clone(), &config.short_code),
            b2c: B2cApi::new(transport.clone(), initiator.clone()),
            account: AccountApi::new(transport.clone(), initiator.clone()),
            transaction: TransactionApi::new(transport, initiator),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Current access token, fetching one if needed.
    pub async fn access_token(&self) -> MpesaResult<String> {
        self.auth.access_token().await
    }

    /// Drop the cached token so the next call fetches a new one.
    pub fn invalidate_token(&self) {
        self.auth.invalidate();
    }

    /// Send an STK push prompt to the customer's phone.
    pub async fn stk_push(&self, request: &StkPushRequest) -> MpesaResult<StkPushResult> {
        self.stk.push(request).await
    }

    /// Poll an STK push by its `CheckoutRequestID`.
    pub async fn stk_query(&self, request: &StkQueryRequest) -> MpesaResult<StkQueryResponse> {
        self.stk.query(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{stk::STK_PUSH_PATH, B2cSendRequest};
    use httpmock::prelude::*;
    use serde_json::json;

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            environment: Environment::Sandbox,
            short_code: "174379".to_string(),
            pass_key: "passkey".to_string(),
            initiator_name: String::new(),
            security_credential: String::new(),
        }
    }

    async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/oauth/v1/generate")
                    .query_param("grant_type", "client_credentials")
                    .header("Authorization", "Basic a2V5OnNlY3JldA==");
                then.status(200)
                    .json_body(json!({ "access_token": "abc123", "expires_in": "3599" }));
            })
            .await
    }

    #[tokio::test]
    async fn test_stk_push_fetches_token_once() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server).await;
        let push = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(STK_PUSH_PATH)
                    .header("Authorization", "Bearer abc123");
                then.status(200).json_body(json!({
                    "MerchantRequestID": "1",
                    "CheckoutRequestID": "ws_CO_1",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing"
                }));
            })
            .await;

        let mpesa = Mpesa::with_base_url(resolved(), server.base_url()).unwrap();
        let request = StkPushRequest {
            phone_number: "254708374149".to_string(),
            amount: 1.0,
            callback_url: "https://example.com/mpesa/stk".to_string(),
            account_reference: "order-1".to_string(),
            transaction_desc: "Payment".to_string(),
            ..Default::default()
        };

        mpesa.stk_push(&request).await.unwrap();
        mpesa.stk_push(&request).await.unwrap();

        token.assert_hits_async(1).await;
        push.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_b2c_without_initiator_is_rejected() {
        let server = MockServer::start_async().await;
        let mpesa = Mpesa::with_base_url(resolved(), server.base_url()).unwrap();

        let err = mpesa
            .b2c
            .send(&B2cSendRequest {
                recipient_phone: "254708374149".to_string(),
                amount: 10.0,
                result_url: "https://example.com/result".to_string(),
                queue_timeout_url: "https://example.com/timeout".to_string(),
                remarks: "Refund".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_token() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server).await;

        let mpesa = Mpesa::with_base_url(resolved(), server.base_url()).unwrap();
        assert_eq!(mpesa.access_token().await.unwrap(), "abc123");
        mpesa.invalidate_token();
        assert_eq!(mpesa.access_token().await.unwrap(), "abc123");

        token.assert_hits_async(2).await;
        assert_eq!(mpesa.environment(), Environment::Sandbox);
    }
}
