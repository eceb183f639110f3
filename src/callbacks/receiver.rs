//! Callback receiver: parse incoming Daraja POST bodies and dispatch them to
//! typed handlers.
//!
//! Each request goes through: method check → route lookup → body read → JSON
//! parse → payload validation → handler → response. The first failing step
//! decides the response.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Json, Router,
};
use futures::FutureExt;
use http::{request::Parts, Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::parsers::{
    parse_c2b_confirmation, parse_c2b_validation, parse_daraja_result, parse_stk_push_callback,
};
use super::types::{
    C2bConfirmation, C2bValidation, C2bValidationResponse, DarajaResult, StkPushCallback,
};
use crate::error::{MpesaError, MpesaResult};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler returns: `Ok(None)` for the default response, `Ok(Some(..))`
/// to override it, `Err` for a 500.
pub type HandlerResult = Result<Option<CallbackResponse>, BoxError>;

pub type CallbackParser<T> = fn(&Value) -> MpesaResult<T>;

pub type NotFoundHook = Arc<dyn Fn(&Parts) -> Response + Send + Sync>;
pub type ParseErrorHook = Arc<dyn Fn(&MpesaError, &Parts) -> Response + Send + Sync>;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// Largest callback body read before answering 413. Daraja payloads are a few KiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Response body: objects go out as JSON, strings as plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
}

impl From<&str> for ResponseBody {
    fn from(value: &str) -> Self {
        ResponseBody::Text(value.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        ResponseBody::Text(value)
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        ResponseBody::Json(value)
    }
}

/// Handler-chosen response. Unset parts fall back to the receiver's success defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackResponse {
    pub status: Option<StatusCode>,
    pub body: Option<ResponseBody>,
}

impl CallbackResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn body(mut self, body: impl Into<ResponseBody>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl From<C2bValidationResponse> for CallbackResponse {
    fn from(response: C2bValidationResponse) -> Self {
        CallbackResponse::new().body(json!({
            "ResultCode": response.result_code,
            "ResultDesc": response.result_desc,
        }))
    }
}

/// Business logic for one callback kind.
#[async_trait]
pub trait CallbackHandler<T: Send + 'static>: Send + Sync {
    async fn handle(&self, payload: T) -> HandlerResult;
}

/// Adapts an async closure to [`CallbackHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<T, F, Fut> CallbackHandler<T> for FnHandler<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: T) -> HandlerResult {
        (self.0)(payload).await
    }
}

/// A parser paired with the handler that receives its output.
pub struct CallbackRoute<T> {
    parse: CallbackParser<T>,
    handler: Arc<dyn CallbackHandler<T>>,
}

impl<T: Send + 'static> CallbackRoute<T> {
    pub fn new(parse: CallbackParser<T>, handler: impl CallbackHandler<T> + 'static) -> Self {
        Self {
            parse,
            handler: Arc::new(handler),
        }
    }

    pub fn from_fn<F, Fut>(parse: CallbackParser<T>, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new(parse, FnHandler(handler))
    }
}

/// Type-erased route as stored in the receiver.
trait Route: Send + Sync {
    /// Validate the body; on success hand back the pending handler call.
    fn accept<'a>(&'a self, raw: &Value) -> MpesaResult<HandlerFuture<'a>>;
}

impl<T: Send + 'static> Route for CallbackRoute<T> {
    fn accept<'a>(&'a self, raw: &Value) -> MpesaResult<HandlerFuture<'a>> {
        let payload = (self.parse)(raw)?;
        Ok(self.handler.handle(payload))
    }
}

/// STK push result route.
pub fn stk_push_route<F, Fut>(handler: F) -> CallbackRoute<StkPushCallback>
where
    F: Fn(StkPushCallback) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    CallbackRoute::from_fn(parse_stk_push_callback, handler)
}

/// C2B confirmation route.
pub fn c2b_confirmation_route<F, Fut>(handler: F) -> CallbackRoute<C2bConfirmation>
where
    F: Fn(C2bConfirmation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    CallbackRoute::from_fn(parse_c2b_confirmation, handler)
}

/// C2B validation route. Return `Some(C2B_VALIDATION_ACCEPT.into())` (or REJECT)
/// so the gateway gets the `ResultCode`/`ResultDesc` body it expects.
pub fn c2b_validation_route<F, Fut>(handler: F) -> CallbackRoute<C2bValidation>
where
    F: Fn(C2bValidation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    CallbackRoute::from_fn(parse_c2b_validation, handler)
}

/// B2C, account balance and transaction status result route.
pub fn daraja_result_route<F, Fut>(handler: F) -> CallbackRoute<DarajaResult>
where
    F: Fn(DarajaResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    CallbackRoute::from_fn(parse_daraja_result, handler)
}

fn internal_error() -> Response {
    send(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ResponseBody::from("Internal Server Error"),
    )
}

fn send(status: StatusCode, body: &ResponseBody) -> Response {
    match body {
        ResponseBody::Json(value) => (status, Json(value.clone())).into_response(),
        ResponseBody::Text(text) => (status, text.clone()).into_response(),
    }
}

/// Path-keyed webhook dispatcher.
pub struct CallbackReceiver {
    routes: HashMap<String, Arc<dyn Route>>,
    success_status: StatusCode,
    success_body: ResponseBody,
    max_body_bytes: usize,
    on_parse_error: Option<ParseErrorHook>,
    on_not_found: Option<NotFoundHook>,
}

pub struct CallbackReceiverBuilder {
    routes: HashMap<String, Arc<dyn Route>>,
    success_status: StatusCode,
    success_body: ResponseBody,
    max_body_bytes: usize,
    on_parse_error: Option<ParseErrorHook>,
    on_not_found: Option<NotFoundHook>,
}

impl Default for CallbackReceiverBuilder {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            success_status: StatusCode::OK,
            success_body: ResponseBody::from("OK"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            on_parse_error: None,
            on_not_found: None,
        }
    }
}

impl CallbackReceiverBuilder {
    /// Register `route` under an exact path such as `/mpesa/stk`.
    pub fn route<T: Send + 'static>(
        mut self,
        path: impl Into<String>,
        route: CallbackRoute<T>,
    ) -> Self {
        self.routes.insert(path.into(), Arc::new(route));
        self
    }

    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    pub fn success_body(mut self, body: impl Into<ResponseBody>) -> Self {
        self.success_body = body.into();
        self
    }

    /// Bodies longer than this get a 413 without being parsed.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Replaces the 400 sent for invalid JSON or an invalid callback shape.
    pub fn on_parse_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MpesaError, &Parts) -> Response + Send + Sync + 'static,
    {
        self.on_parse_error = Some(Arc::new(hook));
        self
    }

    /// Replaces the 404 sent for non-POST requests and unknown paths.
    pub fn on_not_found<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Parts) -> Response + Send + Sync + 'static,
    {
        self.on_not_found = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> CallbackReceiver {
        CallbackReceiver {
            routes: self.routes,
            success_status: self.success_status,
            success_body: self.success_body,
            max_body_bytes: self.max_body_bytes,
            on_parse_error: self.on_parse_error,
            on_not_found: self.on_not_found,
        }
    }
}

impl CallbackReceiver {
    pub fn builder() -> CallbackReceiverBuilder {
        CallbackReceiverBuilder::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Run one inbound request through the pipeline.
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        if parts.method != Method::POST {
            return self.not_found(&parts);
        }

        // Uri::path() excludes the query string
        let path = parts.uri.path();
        let Some(route) = self.routes.get(path) else {
            debug!("No callback route for {}", path);
            return self.not_found(&parts);
        };

        let bytes = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!("Callback body on {} exceeds {} bytes", path, self.max_body_bytes);
                return send(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &ResponseBody::from("Payload Too Large"),
                );
            }
            Err(e) => {
                warn!("Failed to read callback body on {}: {}", path, e);
                return send(StatusCode::BAD_REQUEST, &ResponseBody::from("Bad Request"));
            }
        };

        let raw = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Invalid JSON callback body on {}: {}", path, e);
                    return match &self.on_parse_error {
                        Some(hook) => hook(&MpesaError::callback("Invalid JSON body"), &parts),
                        None => send(
                            StatusCode::BAD_REQUEST,
                            &ResponseBody::from("Bad Request: invalid JSON"),
                        ),
                    };
                }
            }
        };

        let pending = match route.accept(&raw) {
            Ok(pending) => pending,
            Err(err) => {
                warn!("Rejected callback on {}: {}", path, err);
                return match (&self.on_parse_error, err.is_callback()) {
                    (Some(hook), true) => hook(&err, &parts),
                    (None, true) => send(
                        StatusCode::BAD_REQUEST,
                        &ResponseBody::Json(json!({ "error": err.message })),
                    ),
                    (_, false) => send(
                        StatusCode::BAD_REQUEST,
                        &ResponseBody::from("Bad Request: invalid callback body"),
                    ),
                };
            }
        };

        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(None)) => send(self.success_status, &self.success_body),
            Ok(Ok(Some(response))) => send(
                response.status.unwrap_or(self.success_status),
                response.body.as_ref().unwrap_or(&self.success_body),
            ),
            Ok(Err(e)) => {
                error!("Callback handler for {} failed: {}", path, e);
                internal_error()
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Callback handler for {} panicked: {}", path, msg);
                internal_error()
            }
        }
    }

    /// Mount the receiver so every method and path reaches [`Self::handle`].
    pub fn into_router(self) -> Router {
        Router::new().fallback(receive).with_state(Arc::new(self))
    }

    fn not_found(&self, parts: &Parts) -> Response {
        match &self.on_not_found {
            Some(hook) => hook(parts),
            None => send(StatusCode::NOT_FOUND, &ResponseBody::from("Not Found")),
        }
    }
}

async fn receive(State(receiver): State<Arc<CallbackReceiver>>, request: Request) -> Response {
    receiver.handle(request).await
}
