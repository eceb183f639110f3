//! Daraja request and response types
//!
//! Request types are what callers fill in; the gateway's wire bodies are built
//! from them inside each operation module. Response types keep Daraja's field
//! spelling on the wire.

use serde::{Deserialize, Serialize};

use crate::callbacks::CallbackValue;

/// Lipa Na M-Pesa / C2B transaction type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Paybill number
    #[default]
    CustomerPayBillOnline,
    /// Till number
    CustomerBuyGoodsOnline,
}

/// What the gateway does when the C2B validation URL is unreachable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    #[default]
    Completed,
    Cancelled,
}

/// B2C payment kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum B2cCommandId {
    #[default]
    BusinessPayment,
    SalaryPayment,
    PromotionPayment,
}

/// Party identifier type for account balance and transaction status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierType {
    Msisdn,
    Till,
    /// Organization shortcode
    #[default]
    Organization,
}

impl IdentifierType {
    pub fn code(&self) -> u8 {
        match self {
            IdentifierType::Msisdn => 1,
            IdentifierType::Till => 2,
            IdentifierType::Organization => 4,
        }
    }
}

/// STK push (Lipa Na M-Pesa Online) request
#[derive(Debug, Clone, Default)]
pub struct StkPushRequest {
    /// Customer phone; any accepted Kenyan format
    pub phone_number: String,
    /// Amount to charge, rounded to whole shillings on the wire
    pub amount: f64,
    /// URL that receives the STK callback
    pub callback_url: String,
    /// Account reference shown to the customer (e.g. invoice number)
    pub account_reference: String,
    pub transaction_desc: String,
    /// Overrides the configured shortcode
    pub short_code: Option<String>,
    /// Defaults to paybill
    pub transaction_type: Option<TransactionType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    #[serde(default)]
    pub customer_message: String,
}

/// STK push response plus the timestamp used for its password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StkPushResult {
    #[serde(flatten)]
    pub response: StkPushResponse,
    /// `YYYYMMDDHHmmss`; pass to [`StkQueryRequest::timestamp`] when polling
    pub timestamp: String,
}

/// STK push status query
#[derive(Debug, Clone, Default)]
pub struct StkQueryRequest {
    /// `CheckoutRequestID` from the push response
    pub checkout_request_id: String,
    /// Timestamp of the original push, so the password matches; defaults to now
    pub timestamp: Option<String>,
    pub short_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkQueryResponse {
    pub response_code: String,
    pub response_description: String,
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// Sent as a number or a numeric string depending on the gateway build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<CallbackValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
}

/// C2B confirmation/validation URL registration
#[derive(Debug, Clone, Default)]
pub struct C2bRegisterUrlsRequest {
    /// Receives completed transactions
    pub confirmation_url: String,
    /// Receives transactions before completion
    pub validation_url: String,
    pub response_type: Option<ResponseType>,
    pub short_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bRegisterUrlsResponse {
    #[serde(rename = "ConversationID", default)]
    pub conversation_id: String,
    /// The gateway misspells this field on registration responses
    #[serde(
        rename = "OriginatorCoversationID",
        alias = "OriginatorConversationID",
        default
    )]
    pub originator_conversation_id: String,
    pub response_description: String,
}

/// Simulated C2B payment (sandbox only)
#[derive(Debug, Clone, Default)]
pub struct C2bSimulateRequest {
    pub amount: f64,
    /// Paying customer's phone
    pub msisdn: String,
    /// Omitted from the wire body when empty
    pub bill_ref_number: Option<String>,
    pub short_code: Option<String>,
    pub command_id: Option<TransactionType>,
}

/// Shared acknowledgement for C2B simulate, B2C, account balance and
/// transaction status. The actual outcome arrives later on the result URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConversationResponse {
    #[serde(rename = "ConversationID")]
    pub conversation_id: String,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    pub response_description: String,
}

pub type C2bSimulateResponse = ConversationResponse;
pub type B2cSendResponse = ConversationResponse;
pub type AccountBalanceResponse = ConversationResponse;
pub type TransactionStatusResponse = ConversationResponse;

/// B2C disbursement
#[derive(Debug, Clone, Default)]
pub struct B2cSendRequest {
    pub recipient_phone: String,
    pub amount: f64,
    /// Receives the `Result` callback
    pub result_url: String,
    /// Receives the timeout callback
    pub queue_timeout_url: String,
    /// Purpose of the payment
    pub remarks: String,
    /// Omitted from the wire body when empty
    pub occasion: Option<String>,
    pub command_id: Option<B2cCommandId>,
    pub short_code: Option<String>,
}

/// Account balance query; the balance arrives on `result_url`
#[derive(Debug, Clone, Default)]
pub struct AccountBalanceRequest {
    pub result_url: String,
    pub queue_timeout_url: String,
    pub short_code: Option<String>,
    pub identifier_type: Option<IdentifierType>,
}

/// Transaction status query, for when the original callback was lost
#[derive(Debug, Clone, Default)]
pub struct TransactionStatusRequest {
    /// M-Pesa transaction ID (e.g. `TransID` or `TransactionID` from a callback)
    pub transaction_id: String,
    pub result_url: String,
    pub queue_timeout_url: String,
    pub remarks: String,
    pub short_code: Option<String>,
    pub identifier_type: Option<IdentifierType>,
}
