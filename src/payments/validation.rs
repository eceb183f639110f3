//! Local input checks run before any Daraja call.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::error::{MpesaError, MpesaResult};

static KENYA_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^254[17]\d{8}$").expect("KENYA_PHONE is a valid regex pattern")
});

/// Normalize a Kenyan number to `254XXXXXXXXX`.
///
/// `712345678`, `0712345678`, `254712345678` and `+254 712 345 678` all map to
/// `254712345678`. Anything else is returned unchanged.
pub fn normalize_phone(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        9 if digits.starts_with('7') => format!("254{}", digits),
        10 if digits.starts_with('0') => format!("254{}", &digits[1..]),
        12 if digits.starts_with("254") => digits,
        _ => value.to_string(),
    }
}

/// Validate a phone number and return its normalized form.
pub fn validate_phone(phone: &str) -> MpesaResult<String> {
    let normalized = normalize_phone(phone);
    if !KENYA_PHONE.is_match(&normalized) {
        return Err(MpesaError::validation(format!(
            "Invalid phone number: expected Kenya format (254XXXXXXXXX), got: {}",
            phone
        )));
    }
    Ok(normalized)
}

pub fn require_non_empty(value: &str, name: &str) -> MpesaResult<()> {
    if value.trim().is_empty() {
        return Err(MpesaError::validation(format!(
            "Missing or empty required field: {}",
            name
        )));
    }
    Ok(())
}

/// Amounts may be fractional here; Daraja receives them rounded.
pub fn require_positive_amount(value: f64, name: &str) -> MpesaResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MpesaError::validation(format!(
            "{} must be a positive number, got: {}",
            name, value
        )));
    }
    Ok(value)
}

pub fn validate_url(value: &str, name: &str) -> MpesaResult<()> {
    require_non_empty(value, name)?;
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| MpesaError::validation(format!("Invalid URL for {}: {}", name, value)))
}

/// Whole shillings as sent on the wire.
pub(crate) fn wire_amount(amount: f64) -> u64 {
    amount.round() as u64
}
