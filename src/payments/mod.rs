//! Outbound Daraja operations
//!
//! Each operation validates its input locally, fills in configured defaults
//! and POSTs through the shared [`HttpTransport`](crate::transport::HttpTransport).
//! Input problems surface as `Validation` errors before any network call.

pub mod account;
pub mod b2c;
pub mod c2b;
pub mod stk;
pub mod transaction;
pub mod types;
pub mod validation;

pub use account::AccountApi;
pub use b2c::B2cApi;
pub use c2b::C2bApi;
pub use stk::{stk_password, timestamp, StkApi};
pub use transaction::TransactionApi;
pub use types::*;
pub use validation::{normalize_phone, validate_phone};

use crate::config::ResolvedConfig;

/// Organization identity used by B2C, account balance and transaction status.
#[derive(Debug, Clone, Default)]
pub struct Initiator {
    pub short_code: String,
    pub name: String,
    /// Initiator password encrypted with the gateway's public certificate
    pub security_credential: String,
}

impl Initiator {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            short_code: config.short_code.clone(),
            name: config.initiator_name.clone(),
            security_credential: config.security_credential.clone(),
        }
    }

    /// Shortcode to use for a call, or `None` when any part of the identity is missing.
    pub(crate) fn short_code_for<'a>(&'a self, short_code: Option<&'a str>) -> Option<&'a str> {
        let short_code = short_code.unwrap_or(&self.short_code);
        if short_code.is_empty() || self.name.is_empty() || self.security_credential.is_empty() {
            None
        } else {
            Some(short_code)
        }
    }
}
