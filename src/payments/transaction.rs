//! Transaction status query

use std::sync::Arc;

use serde::Serialize;

use super::types::{TransactionStatusRequest, TransactionStatusResponse};
use super::validation::{require_non_empty, validate_url};
use super::Initiator;
use crate::error::{MpesaError, MpesaResult};
use crate::transport::HttpTransport;

pub const TRANSACTION_STATUS_PATH: &str = "/mpesa/transactionstatus/v1/query";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusBody<'a> {
    initiator: &'a str,
    security_credential: &'a str,
    #[serde(rename = "CommandID")]
    command_id: &'static str,
    #[serde(rename = "TransactionID")]
    transaction_id: &'a str,
    party_a: &'a str,
    identifier_type: u8,
    #[serde(rename = "ResultURL")]
    result_url: &'a str,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: &'a str,
    remarks: &'a str,
}

pub struct TransactionApi {
    transport: Arc<HttpTransport>,
    initiator: Initiator,
}

impl TransactionApi {
    pub fn new(transport: Arc<HttpTransport>, initiator: Initiator) -> Self {
        Self {
            transport,
            initiator,
        }
    }

    pub async fn status(
        &self,
        request: &TransactionStatusRequest,
    ) -> MpesaResult<TransactionStatusResponse> {
        require_non_empty(&request.transaction_id, "transactionId")?;
        validate_url(&request.result_url, "resultUrl")?;
        validate_url(&request.queue_timeout_url, "queueTimeOutUrl")?;
        require_non_empty(&request.remarks, "remarks")?;

        let short_code = self
            .initiator
            .short_code_for(request.short_code.as_deref())
            .ok_or_else(|| {
                MpesaError::validation(
                    "Transaction status requires shortCode, initiatorName, and securityCredential in config",
                )
            })?;

        let body = StatusBody {
            initiator: &self.initiator.name,
            security_credential: &self.initiator.security_credential,
            command_id: "TransactionStatusQuery",
            transaction_id: &request.transaction_id,
            party_a: short_code,
            identifier_type: request.identifier_type.unwrap_or_default().code(),
            result_url: &request.result_url,
            queue_timeout_url: &request.queue_timeout_url,
            remarks: &request.remarks,
        };

        self.transport.post(TRANSACTION_STATUS_PATH, &body).await
    }
}
