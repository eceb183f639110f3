//! Validate raw callback bodies into typed payloads.
//!
//! Every required field is checked explicitly; a missing or mistyped one fails
//! the whole parse with a `Callback` error carrying the offending value.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

use super::types::{
    parse_numeric, C2bConfirmation, C2bValidation, C2bValidationResponse, CallbackItem,
    CallbackMetadata, CallbackValue, DarajaResult, DarajaResultBody, ReferenceData,
    ReferenceItem, ResultParameters, ResultParametersMap, StkPushCallback,
    StkPushSuccessMetadata,
};
use crate::error::{MpesaError, MpesaResult};

/// Accept the C2B payment; the transaction completes.
pub const C2B_VALIDATION_ACCEPT: C2bValidationResponse = C2bValidationResponse {
    result_code: 0,
    result_desc: Cow::Borrowed("Accept"),
};

/// Reject the C2B payment; the transaction is cancelled.
pub const C2B_VALIDATION_REJECT: C2bValidationResponse = C2bValidationResponse {
    result_code: 1,
    result_desc: Cow::Borrowed("Reject"),
};

pub fn c2b_validation_response(
    result_code: i64,
    result_desc: impl Into<Cow<'static, str>>,
) -> C2bValidationResponse {
    C2bValidationResponse {
        result_code,
        result_desc: result_desc.into(),
    }
}

fn expect_object<'a>(value: Option<&'a Value>, path: &str) -> MpesaResult<&'a Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Err(MpesaError::callback(format!(
            "Missing or invalid callback body: {}",
            path
        ))
        .with_body(value.cloned())),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(MpesaError::callback(format!("Expected object at {}", path))
            .with_body(Some(other.clone()))),
    }
}

fn expect_number(value: Option<&Value>, field: &str) -> MpesaResult<f64> {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => parse_numeric(s),
        _ => None,
    };
    number.ok_or_else(|| {
        MpesaError::callback(format!("Expected number at {}", field)).with_body(value.cloned())
    })
}

/// Result codes and types: numeric, and whole.
fn expect_integer(value: Option<&Value>, field: &str) -> MpesaResult<i64> {
    if let Some(n) = value.and_then(Value::as_i64) {
        return Ok(n);
    }
    let number = expect_number(value, field)?;
    if number.fract() != 0.0 || number.abs() > i64::MAX as f64 {
        return Err(MpesaError::callback(format!("Expected integer at {}", field))
            .with_body(value.cloned()));
    }
    Ok(number as i64)
}

fn expect_string(value: Option<&Value>, field: &str) -> MpesaResult<String> {
    scalar_to_string(value).ok_or_else(|| {
        MpesaError::callback(format!("Expected string at {}", field)).with_body(value.cloned())
    })
}

fn optional_string(value: Option<&Value>, field: &str) -> MpesaResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(_) => expect_string(value, field).map(Some),
    }
}

fn optional_integer(value: Option<&Value>, field: &str) -> MpesaResult<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(_) => expect_integer(value, field).map(Some),
    }
}

fn scalar_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn callback_value(value: Option<&Value>) -> Option<CallbackValue> {
    match value? {
        Value::Number(n) => Some(CallbackValue::Number(n.clone())),
        Value::String(s) => Some(CallbackValue::Text(s.clone())),
        Value::Bool(b) => Some(CallbackValue::Text(b.to_string())),
        _ => None,
    }
}

/// Name/value list, if the value is a list at all. Entries without a name are skipped.
fn item_list(value: Option<&Value>) -> Option<Vec<CallbackItem>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| {
                Some(CallbackItem {
                    name: scalar_to_string(item.get("Name"))?,
                    value: callback_value(item.get("Value")),
                })
            })
            .collect(),
    )
}

fn reference_list(value: Option<&Value>) -> Option<Vec<ReferenceItem>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| {
                Some(ReferenceItem {
                    key: scalar_to_string(item.get("Key"))?,
                    value: scalar_to_string(item.get("Value")),
                })
            })
            .collect(),
    )
}

/// Parse an STK push callback (`{"Body": {"stkCallback": {...}}}`).
pub fn parse_stk_push_callback(body: &Value) -> MpesaResult<StkPushCallback> {
    let root = expect_object(Some(body), "body")?;
    let envelope = expect_object(root.get("Body"), "Body")?;
    let stk = expect_object(envelope.get("stkCallback"), "Body.stkCallback")?;

    let callback_metadata = stk
        .get("CallbackMetadata")
        .and_then(Value::as_object)
        .and_then(|meta| item_list(meta.get("Item")))
        .map(|item| CallbackMetadata { item });

    Ok(StkPushCallback {
        result_code: expect_integer(stk.get("ResultCode"), "ResultCode")?,
        result_desc: expect_string(stk.get("ResultDesc"), "ResultDesc")?,
        merchant_request_id: expect_string(stk.get("MerchantRequestID"), "MerchantRequestID")?,
        checkout_request_id: expect_string(stk.get("CheckoutRequestID"), "CheckoutRequestID")?,
        callback_metadata,
    })
}

/// Rich view of a successful STK push.
///
/// Returns `None` unless the result code is 0 and the metadata carries a
/// finite `Amount` plus non-empty `MpesaReceiptNumber`, `TransactionDate` and
/// `PhoneNumber`. A malformed `Balance` is dropped rather than failing.
pub fn stk_metadata(payload: &StkPushCallback) -> Option<StkPushSuccessMetadata> {
    if payload.result_code != 0 {
        return None;
    }
    let items = &payload.callback_metadata.as_ref()?.item;
    if items.is_empty() {
        return None;
    }

    let by_name: HashMap<&str, Option<&CallbackValue>> = items
        .iter()
        .map(|item| (item.name.as_str(), item.value.as_ref()))
        .collect();
    let lookup = |name: &str| by_name.get(name).copied().flatten();
    let text = |name: &str| lookup(name).map(|v| v.to_string()).unwrap_or_default();

    let amount = lookup("Amount").and_then(CallbackValue::as_f64)?;
    let mpesa_receipt_number = text("MpesaReceiptNumber");
    let transaction_date = text("TransactionDate");
    let phone_number = text("PhoneNumber");

    if mpesa_receipt_number.is_empty() || transaction_date.is_empty() || phone_number.is_empty() {
        return None;
    }

    Some(StkPushSuccessMetadata {
        amount,
        mpesa_receipt_number,
        transaction_date,
        phone_number,
        balance: lookup("Balance").and_then(CallbackValue::as_f64),
    })
}

/// Parse a C2B confirmation body.
pub fn parse_c2b_confirmation(body: &Value) -> MpesaResult<C2bConfirmation> {
    let o = expect_object(Some(body), "body")?;
    Ok(C2bConfirmation {
        transaction_type: expect_string(o.get("TransactionType"), "TransactionType")?,
        trans_id: expect_string(o.get("TransID"), "TransID")?,
        trans_time: expect_string(o.get("TransTime"), "TransTime")?,
        trans_amount: expect_string(o.get("TransAmount"), "TransAmount")?,
        business_short_code: expect_string(o.get("BusinessShortCode"), "BusinessShortCode")?,
        bill_ref_number: expect_string(o.get("BillRefNumber"), "BillRefNumber")?,
        invoice_number: optional_string(o.get("InvoiceNumber"), "InvoiceNumber")?,
        org_account_balance: optional_string(o.get("OrgAccountBalance"), "OrgAccountBalance")?,
        third_party_trans_id: optional_string(o.get("ThirdPartyTransID"), "ThirdPartyTransID")?,
        msisdn: expect_string(o.get("MSISDN"), "MSISDN")?,
        first_name: optional_string(o.get("FirstName"), "FirstName")?,
        middle_name: optional_string(o.get("MiddleName"), "MiddleName")?,
        last_name: optional_string(o.get("LastName"), "LastName")?,
    })
}

/// Parse a C2B validation body (before the transaction completes).
pub fn parse_c2b_validation(body: &Value) -> MpesaResult<C2bValidation> {
    let o = expect_object(Some(body), "body")?;
    Ok(C2bValidation {
        transaction_type: expect_string(o.get("TransactionType"), "TransactionType")?,
        trans_id: expect_string(o.get("TransID"), "TransID")?,
        trans_time: expect_string(o.get("TransTime"), "TransTime")?,
        trans_amount: expect_string(o.get("TransAmount"), "TransAmount")?,
        business_short_code: expect_string(o.get("BusinessShortCode"), "BusinessShortCode")?,
        bill_ref_number: expect_string(o.get("BillRefNumber"), "BillRefNumber")?,
        invoice_number: optional_string(o.get("InvoiceNumber"), "InvoiceNumber")?,
        msisdn: expect_string(o.get("MSISDN"), "MSISDN")?,
        first_name: optional_string(o.get("FirstName"), "FirstName")?,
        middle_name: optional_string(o.get("MiddleName"), "MiddleName")?,
        last_name: optional_string(o.get("LastName"), "LastName")?,
    })
}

/// Parse a B2C, account balance or transaction status result (`{"Result": {...}}`).
pub fn parse_daraja_result(body: &Value) -> MpesaResult<DarajaResult> {
    let root = expect_object(Some(body), "body")?;
    let result = expect_object(root.get("Result"), "Result")?;

    let result_parameters = result
        .get("ResultParameters")
        .and_then(Value::as_object)
        .and_then(|rp| item_list(rp.get("ResultParameter")))
        .map(|result_parameter| ResultParameters { result_parameter });

    let reference_data = result
        .get("ReferenceData")
        .and_then(Value::as_object)
        .and_then(|rd| reference_list(rd.get("ReferenceItem")))
        .map(|reference_item| ReferenceData { reference_item });

    Ok(DarajaResult {
        result: DarajaResultBody {
            result_code: expect_integer(result.get("ResultCode"), "Result.ResultCode")?,
            result_desc: expect_string(result.get("ResultDesc"), "Result.ResultDesc")?,
            originator_conversation_id: expect_string(
                result.get("OriginatorConversationID"),
                "Result.OriginatorConversationID",
            )?,
            conversation_id: expect_string(result.get("ConversationID"), "Result.ConversationID")?,
            result_type: optional_integer(result.get("ResultType"), "Result.ResultType")?,
            transaction_id: optional_string(result.get("TransactionID"), "Result.TransactionID")?,
            result_parameters,
            reference_data,
        },
    })
}

/// Result parameters as a flat map by name; empty when the list is absent.
pub fn result_parameters_map(payload: &DarajaResult) -> ResultParametersMap {
    payload
        .result
        .result_parameters
        .iter()
        .flat_map(|rp| rp.result_parameter.iter())
        .filter_map(|item| Some((item.name.clone(), item.value.clone()?)))
        .collect()
}
