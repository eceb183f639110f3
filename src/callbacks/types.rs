//! Typed callback payloads for Daraja webhooks.
//!
//! Field names serialize back to the gateway's own spelling so a payload can be
//! logged or forwarded as-is.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Value half of a name/value item: the gateway sends either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallbackValue {
    Number(serde_json::Number),
    Text(String),
}

impl CallbackValue {
    /// Numeric view of the value; numeric strings count.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CallbackValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            CallbackValue::Text(s) => parse_numeric(s),
        }
    }
}

impl fmt::Display for CallbackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackValue::Number(n) => write!(f, "{}", n),
            CallbackValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CallbackValue {
    fn from(value: &str) -> Self {
        CallbackValue::Text(value.to_string())
    }
}

impl From<i64> for CallbackValue {
    fn from(value: i64) -> Self {
        CallbackValue::Number(value.into())
    }
}

/// Trimmed, non-empty, finite decimal string.
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Name/value pair in STK `CallbackMetadata` or result `ResultParameters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<CallbackValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

/// STK push result, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushCallback {
    /// 0 = success; anything else is a failure (1032 = cancelled by user)
    pub result_code: i64,
    pub result_desc: String,
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// Present only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_metadata: Option<CallbackMetadata>,
}

/// Flattened view of a successful STK push's metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushSuccessMetadata {
    pub amount: f64,
    pub mpesa_receipt_number: String,
    pub transaction_date: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

/// C2B confirmation, sent once the payment has completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bConfirmation {
    pub transaction_type: String,
    #[serde(rename = "TransID")]
    pub trans_id: String,
    pub trans_time: String,
    pub trans_amount: String,
    pub business_short_code: String,
    pub bill_ref_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_account_balance: Option<String>,
    #[serde(rename = "ThirdPartyTransID", skip_serializing_if = "Option::is_none")]
    pub third_party_trans_id: Option<String>,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// C2B validation, sent before completion. Answer with a [`C2bValidationResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bValidation {
    pub transaction_type: String,
    #[serde(rename = "TransID")]
    pub trans_id: String,
    pub trans_time: String,
    pub trans_amount: String,
    pub business_short_code: String,
    pub bill_ref_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Body the validation URL returns to accept or reject a C2B payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bValidationResponse {
    pub result_code: i64,
    pub result_desc: Cow<'static, str>,
}

/// Async result envelope for B2C, account balance and transaction status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DarajaResult {
    #[serde(rename = "Result")]
    pub result: DarajaResultBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DarajaResultBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<i64>,
    pub result_code: i64,
    pub result_desc: String,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    #[serde(rename = "ConversationID")]
    pub conversation_id: String,
    #[serde(rename = "TransactionID", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_parameters: Option<ResultParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<ReferenceData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultParameters {
    #[serde(rename = "ResultParameter")]
    pub result_parameter: Vec<CallbackItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceData {
    #[serde(rename = "ReferenceItem")]
    pub reference_item: Vec<ReferenceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceItem {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Result parameters keyed by name (e.g. `TransactionAmount`, `B2CUtilityAccountAvailableFunds`).
pub type ResultParametersMap = BTreeMap<String, CallbackValue>;
