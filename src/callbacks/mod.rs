//! Inbound Daraja webhooks: typed payloads, validators and the receiver.

pub mod parsers;
pub mod receiver;
pub mod types;

pub use parsers::{
    c2b_validation_response, parse_c2b_confirmation, parse_c2b_validation, parse_daraja_result,
    parse_stk_push_callback, result_parameters_map, stk_metadata, C2B_VALIDATION_ACCEPT,
    C2B_VALIDATION_REJECT,
};
pub use receiver::{
    c2b_confirmation_route, c2b_validation_route, daraja_result_route, stk_push_route, BoxError,
    CallbackHandler, CallbackParser, CallbackReceiver, CallbackReceiverBuilder, CallbackResponse,
    CallbackRoute, HandlerResult, ResponseBody,
};
pub use types::*;
