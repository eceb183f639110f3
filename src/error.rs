use serde_json::Value;
use thiserror::Error;

/// Which boundary raised an [`MpesaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaErrorKind {
    /// OAuth token generation or refresh failed
    Auth,
    /// An API call failed at the transport or returned a gateway error status
    Request,
    /// Caller input failed local checks before any network call
    Validation,
    /// An inbound callback body did not match the expected shape
    Callback,
}

impl MpesaErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            MpesaErrorKind::Auth => "MPESA_AUTH_ERROR",
            MpesaErrorKind::Request => "MPESA_REQUEST_ERROR",
            MpesaErrorKind::Validation => "MPESA_VALIDATION_ERROR",
            MpesaErrorKind::Callback => "MPESA_CALLBACK_ERROR",
        }
    }
}

/// Result type for SDK operations
pub type MpesaResult<T> = Result<T, MpesaError>;

/// Error returned by every fallible operation in the crate.
///
/// The `kind` tells callers which boundary failed; `status_code` and
/// `response_body` carry whatever the gateway (or the webhook sender) gave us,
/// for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MpesaError {
    pub kind: MpesaErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub response_body: Option<Value>,
}

impl MpesaError {
    pub fn new(kind: MpesaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            response_body: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(MpesaErrorKind::Auth, message)
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::new(MpesaErrorKind::Request, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(MpesaErrorKind::Validation, message)
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Self::new(MpesaErrorKind::Callback, message)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.response_body = body;
        self
    }

    pub fn kind(&self) -> MpesaErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_auth(&self) -> bool {
        self.kind == MpesaErrorKind::Auth
    }

    pub fn is_request(&self) -> bool {
        self.kind == MpesaErrorKind::Request
    }

    pub fn is_validation(&self) -> bool {
        self.kind == MpesaErrorKind::Validation
    }

    pub fn is_callback(&self) -> bool {
        self.kind == MpesaErrorKind::Callback
    }
}

impl From<reqwest::Error> for MpesaError {
    fn from(err: reqwest::Error) -> Self {
        let error = MpesaError::request(format!("Request error: {}", err));
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}
