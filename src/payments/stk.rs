//! STK push (Lipa Na M-Pesa Online) and status query

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use serde::Serialize;
use tracing::info;

use super::types::{
    StkPushRequest, StkPushResult, StkQueryRequest, StkQueryResponse, TransactionType,
};
use super::validation::{
    require_non_empty, require_positive_amount, validate_phone, validate_url, wire_amount,
};
use crate::error::{MpesaError, MpesaResult};
use crate::transport::HttpTransport;

pub const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
pub const STK_QUERY_PATH: &str = "/mpesa/stkpushquery/v1/query";

/// Current local time as `YYYYMMDDHHmmss`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// `base64(shortcode + passkey + timestamp)`
pub fn stk_password(short_code: &str, pass_key: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", short_code, pass_key, timestamp))
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: &'a str,
    transaction_type: TransactionType,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    call_back_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkQueryBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: &'a str,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

pub struct StkApi {
    transport: Arc<HttpTransport>,
    short_code: String,
    pass_key: String,
}

impl StkApi {
    pub fn new(
        transport: Arc<HttpTransport>,
        short_code: impl Into<String>,
        pass_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            short_code: short_code.into(),
            pass_key: pass_key.into(),
        }
    }

    /// Prompt the customer's phone for their M-Pesa PIN.
    ///
    /// Poll the outcome with [`StkApi::query`] using the returned
    /// `checkout_request_id` and `timestamp`, or wait for the callback.
    pub async fn push(&self, request: &StkPushRequest) -> MpesaResult<StkPushResult> {
        require_non_empty(&request.phone_number, "phoneNumber")?;
        let amount = require_positive_amount(request.amount, "amount")?;
        validate_url(&request.callback_url, "callbackUrl")?;
        require_non_empty(&request.account_reference, "accountReference")?;
        require_non_empty(&request.transaction_desc, "transactionDesc")?;
        let phone = validate_phone(&request.phone_number)?;

        let short_code = request.short_code.as_deref().unwrap_or(&self.short_code);
        if short_code.is_empty() || self.pass_key.is_empty() {
            return Err(MpesaError::validation(
                "STK Push requires shortCode and passKey in config or input",
            ));
        }

        let timestamp = timestamp();
        let body = StkPushBody {
            business_short_code: short_code,
            password: stk_password(short_code, &self.pass_key, &timestamp),
            timestamp: &timestamp,
            transaction_type: request.transaction_type.unwrap_or_default(),
            amount: wire_amount(amount),
            party_a: &phone,
            party_b: short_code,
            phone_number: &phone,
            call_back_url: &request.callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.transaction_desc,
        };

        let response = self.transport.post(STK_PUSH_PATH, &body).await?;
        info!(
            "STK push sent to {} for {} (shortcode {})",
            phone, body.amount, short_code
        );

        Ok(StkPushResult {
            response,
            timestamp,
        })
    }

    /// Query the status of an earlier push.
    pub async fn query(&self, request: &StkQueryRequest) -> MpesaResult<StkQueryResponse> {
        require_non_empty(&request.checkout_request_id, "checkoutRequestId")?;

        let short_code = request.short_code.as_deref().unwrap_or(&self.short_code);
        if short_code.is_empty() || self.pass_key.is_empty() {
            return Err(MpesaError::validation(
                "STK Query requires shortCode and passKey in config",
            ));
        }

        let timestamp = request.timestamp.clone().unwrap_or_else(timestamp);
        let body = StkQueryBody {
            business_short_code: short_code,
            password: stk_password(short_code, &self.pass_key, &timestamp),
            timestamp: &timestamp,
            checkout_request_id: &request.checkout_request_id,
        };

        self.transport.post(STK_QUERY_PATH, &body).await
    }
}
