//! C2B URL registration and sandbox simulation

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::types::{
    C2bRegisterUrlsRequest, C2bRegisterUrlsResponse, C2bSimulateRequest, C2bSimulateResponse,
    ResponseType, TransactionType,
};
use super::validation::{
    require_non_empty, require_positive_amount, validate_phone, validate_url, wire_amount,
};
use crate::error::{MpesaError, MpesaResult};
use crate::transport::HttpTransport;

pub const C2B_REGISTER_URL_PATH: &str = "/mpesa/c2b/v1/registerurl";
pub const C2B_SIMULATE_PATH: &str = "/mpesa/c2b/v1/simulate";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterUrlsBody<'a> {
    short_code: &'a str,
    response_type: ResponseType,
    #[serde(rename = "ConfirmationURL")]
    confirmation_url: &'a str,
    #[serde(rename = "ValidationURL")]
    validation_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SimulateBody<'a> {
    short_code: &'a str,
    #[serde(rename = "CommandID")]
    command_id: TransactionType,
    amount: u64,
    msisdn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bill_ref_number: Option<&'a str>,
}

pub struct C2bApi {
    transport: Arc<HttpTransport>,
    short_code: String,
}

impl C2bApi {
    pub fn new(transport: Arc<HttpTransport>, short_code: impl Into<String>) -> Self {
        Self {
            transport,
            short_code: short_code.into(),
        }
    }

    /// Register the confirmation and validation URLs for a paybill or till.
    pub async fn register_urls(
        &self,
        request: &C2bRegisterUrlsRequest,
    ) -> MpesaResult<C2bRegisterUrlsResponse> {
        validate_url(&request.confirmation_url, "confirmationUrl")?;
        validate_url(&request.validation_url, "validationUrl")?;

        let short_code = request.short_code.as_deref().unwrap_or(&self.short_code);
        if short_code.is_empty() {
            return Err(MpesaError::validation(
                "C2B registerUrls requires shortCode in config",
            ));
        }

        let body = RegisterUrlsBody {
            short_code,
            response_type: request.response_type.unwrap_or_default(),
            confirmation_url: &request.confirmation_url,
            validation_url: &request.validation_url,
        };

        let response = self.transport.post(C2B_REGISTER_URL_PATH, &body).await?;
        info!("Registered C2B URLs for shortcode {}", short_code);
        Ok(response)
    }

    /// Simulate a customer payment. Sandbox only.
    pub async fn simulate(&self, request: &C2bSimulateRequest) -> MpesaResult<C2bSimulateResponse> {
        let amount = require_positive_amount(request.amount, "amount")?;
        require_non_empty(&request.msisdn, "msisdn")?;
        let msisdn = validate_phone(&request.msisdn)?;

        let short_code = request.short_code.as_deref().unwrap_or(&self.short_code);
        if short_code.is_empty() {
            return Err(MpesaError::validation(
                "C2B simulate requires shortCode in config",
            ));
        }

        let body = SimulateBody {
            short_code,
            command_id: request.command_id.unwrap_or_default(),
            amount: wire_amount(amount),
            msisdn: &msisdn,
            bill_ref_number: request
                .bill_ref_number
                .as_deref()
                .filter(|bill_ref| !bill_ref.is_empty()),
        };

        self.transport.post(C2B_SIMULATE_PATH, &body).await
    }
}
