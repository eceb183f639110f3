//! Account balance query

use std::sync::Arc;

use serde::Serialize;

use super::types::{AccountBalanceRequest, AccountBalanceResponse};
use super::validation::validate_url;
use super::Initiator;
use crate::error::{MpesaError, MpesaResult};
use crate::transport::HttpTransport;

pub const ACCOUNT_BALANCE_PATH: &str = "/mpesa/accountbalance/v1/query";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BalanceBody<'a> {
    initiator: &'a str,
    security_credential: &'a str,
    #[serde(rename = "CommandID")]
    command_id: &'static str,
    party_a: &'a str,
    identifier_type: u8,
    #[serde(rename = "ResultURL")]
    result_url: &'a str,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: &'a str,
}

pub struct AccountApi {
    transport: Arc<HttpTransport>,
    initiator: Initiator,
}

impl AccountApi {
    pub fn new(transport: Arc<HttpTransport>, initiator: Initiator) -> Self {
        Self {
            transport,
            initiator,
        }
    }

    /// Request the balance. The figures arrive on `result_url`; correlate them
    /// by `ConversationID`.
    pub async fn balance(
        &self,
        request: &AccountBalanceRequest,
    ) -> MpesaResult<AccountBalanceResponse> {
        validate_url(&request.result_url, "resultUrl")?;
        validate_url(&request.queue_timeout_url, "queueTimeOutUrl")?;

        let short_code = self
            .initiator
            .short_code_for(request.short_code.as_deref())
            .ok_or_else(|| {
                MpesaError::validation(
                    "Account balance requires shortCode, initiatorName, and securityCredential in config",
                )
            })?;

        let body = BalanceBody {
            initiator: &self.initiator.name,
            security_credential: &self.initiator.security_credential,
            command_id: "AccountBalance",
            party_a: short_code,
            identifier_type: request.identifier_type.unwrap_or_default().code(),
            result_url: &request.result_url,
            queue_timeout_url: &request.queue_timeout_url,
        };

        self.transport.post(ACCOUNT_BALANCE_PATH, &body).await
    }
}
