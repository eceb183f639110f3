//! B2C disbursements

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::types::{B2cCommandId, B2cSendRequest, B2cSendResponse};
use super::validation::{
    require_non_empty, require_positive_amount, validate_phone, validate_url, wire_amount,
};
use super::Initiator;
use crate::error::{MpesaError, MpesaResult};
use crate::transport::HttpTransport;

pub const B2C_PAYMENT_PATH: &str = "/mpesa/b2c/v1/paymentrequest";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentBody<'a> {
    initiator_name: &'a str,
    security_credential: &'a str,
    #[serde(rename = "CommandID")]
    command_id: B2cCommandId,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    remarks: &'a str,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: &'a str,
    #[serde(rename = "ResultURL")]
    result_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    occasion: Option<&'a str>,
}

pub struct B2cApi {
    transport: Arc<HttpTransport>,
    initiator: Initiator,
}

impl B2cApi {
    pub fn new(transport: Arc<HttpTransport>, initiator: Initiator) -> Self {
        Self {
            transport,
            initiator,
        }
    }

    /// Send money to a customer. The outcome arrives as a `Result` callback on
    /// `result_url`.
    pub async fn send(&self, request: &B2cSendRequest) -> MpesaResult<B2cSendResponse> {
        require_non_empty(&request.recipient_phone, "recipientPhone")?;
        let amount = require_positive_amount(request.amount, "amount")?;
        validate_url(&request.result_url, "resultUrl")?;
        validate_url(&request.queue_timeout_url, "queueTimeOutUrl")?;
        require_non_empty(&request.remarks, "remarks")?;
        let party_b = validate_phone(&request.recipient_phone)?;

        let short_code = self
            .initiator
            .short_code_for(request.short_code.as_deref())
            .ok_or_else(|| {
                MpesaError::validation(
                    "B2C requires shortCode, initiatorName, and securityCredential in config",
                )
            })?;

        let body = PaymentBody {
            initiator_name: &self.initiator.name,
            security_credential: &self.initiator.security_credential,
            command_id: request.command_id.unwrap_or_default(),
            amount: wire_amount(amount),
            party_a: short_code,
            party_b: &party_b,
            remarks: &request.remarks,
            queue_timeout_url: &request.queue_timeout_url,
            result_url: &request.result_url,
            occasion: request.occasion.as_deref().filter(|o| !o.is_empty()),
        };

        let response: B2cSendResponse = self.transport.post(B2C_PAYMENT_PATH, &body).await?;
        info!(
            "B2C payment of {} to {} accepted: {}",
            body.amount, party_b, response.conversation_id
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::test_support::{mock_transport, test_initiator};
    use httpmock::prelude::*;
    use serde_json::json;

    fn send_request() -> B2cSendRequest {
        B2cSendRequest {
            recipient_phone: "0708374149".to_string(),
            amount: 250.0,
            result_url: "https://example.com/mpesa/result".to_string(),
            queue_timeout_url: "https://example.com/mpesa/timeout".to_string(),
            remarks: "Refund".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_builds_payment_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(B2C_PAYMENT_PATH).json_body(json!({
                    "InitiatorName": "testapi",
                    "SecurityCredential": "encrypted-credential",
                    "CommandID": "SalaryPayment",
                    "Amount": 250,
                    "PartyA": "600999",
                    "PartyB": "254708374149",
                    "Remarks": "Refund",
                    "QueueTimeOutURL": "https://example.com/mpesa/timeout",
                    "ResultURL": "https://example.com/mpesa/result",
                    "Occasion": "June payroll"
                }));
                then.status(200).json_body(json!({
                    "ConversationID": "AG_20191219_00005797af5d7d75f652",
                    "OriginatorConversationID": "16740-34861180-1",
                    "ResponseCode": "0",
                    "ResponseDescription": "Accept the service request successfully."
                }));
            })
            .await;

        let api = B2cApi::new(mock_transport(&server), test_initiator());
        let response = api
            .send(&B2cSendRequest {
                occasion: Some("June payroll".to_string()),
                command_id: Some(B2cCommandId::SalaryPayment),
                ..send_request()
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.conversation_id, "AG_20191219_00005797af5d7d75f652");
        assert_eq!(response.response_code.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_send_requires_initiator() {
        let server = MockServer::start_async().await;
        let api = B2cApi::new(mock_transport(&server), Initiator::default());

        let err = api.send(&send_request()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.message,
            "B2C requires shortCode, initiatorName, and securityCredential in config"
        );
    }

    #[tokio::test]
    async fn test_send_validates_before_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;
        let api = B2cApi::new(mock_transport(&server), test_initiator());

        let err = api
            .send(&B2cSendRequest {
                remarks: " ".to_string(),
                ..send_request()
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Missing or empty required field: remarks");

        let err = api
            .send(&B2cSendRequest {
                queue_timeout_url: String::new(),
                ..send_request()
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Missing or empty required field: queueTimeOutUrl");

        assert_eq!(mock.hits_async().await, 0);
    }
}
