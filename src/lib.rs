//! M-Pesa Daraja client and callback engine.
//!
//! Outbound: [`Mpesa`] wraps OAuth, STK push/query, C2B, B2C, account balance
//! and transaction status. Inbound: [`callbacks::CallbackReceiver`] validates
//! webhook bodies into typed payloads and dispatches them to handlers.

pub mod api;
pub mod auth;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod payments;
pub mod transport;

pub use auth::{AccessTokenProvider, CredentialFetcher, DarajaCredentialFetcher, TokenGrant};
pub use callbacks::{
    c2b_confirmation_route, c2b_validation_route, daraja_result_route, stk_push_route,
    CallbackReceiver, CallbackResponse, HandlerResult, C2B_VALIDATION_ACCEPT,
    C2B_VALIDATION_REJECT,
};
pub use client::Mpesa;
pub use config::{Environment, MpesaConfig, ResolvedConfig};
pub use error::{MpesaError, MpesaErrorKind, MpesaResult};
pub use payments::{
    AccountBalanceRequest, B2cSendRequest, C2bRegisterUrlsRequest, C2bSimulateRequest,
    StkPushRequest, StkPushResult, StkQueryRequest, TransactionStatusRequest,
};
pub use transport::HttpTransport;
