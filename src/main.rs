use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mpesa_daraja::api::health::{health_check, HealthState};
use mpesa_daraja::callbacks::{
    result_parameters_map, stk_metadata, C2bConfirmation, C2bValidation, DarajaResult,
    StkPushCallback,
};
use mpesa_daraja::config::ServerConfig;
use mpesa_daraja::{
    c2b_confirmation_route, c2b_validation_route, daraja_result_route, stk_push_route,
    CallbackReceiver, Environment, HandlerResult, C2B_VALIDATION_ACCEPT,
};

async fn on_stk(payload: StkPushCallback) -> HandlerResult {
    match stk_metadata(&payload) {
        Some(meta) => info!(
            checkout_request_id = %payload.checkout_request_id,
            receipt = %meta.mpesa_receipt_number,
            amount = meta.amount,
            phone = %meta.phone_number,
            "STK push paid"
        ),
        None => warn!(
            checkout_request_id = %payload.checkout_request_id,
            result_code = payload.result_code,
            "STK push failed: {}",
            payload.result_desc
        ),
    }
    Ok(None)
}

async fn on_c2b_confirmation(payload: C2bConfirmation) -> HandlerResult {
    info!(
        trans_id = %payload.trans_id,
        amount = %payload.trans_amount,
        bill_ref = %payload.bill_ref_number,
        "C2B payment confirmed"
    );
    Ok(None)
}

async fn on_c2b_validation(payload: C2bValidation) -> HandlerResult {
    info!(
        trans_id = %payload.trans_id,
        amount = %payload.trans_amount,
        "C2B validation accepted"
    );
    Ok(Some(C2B_VALIDATION_ACCEPT.into()))
}

async fn on_result(payload: DarajaResult) -> HandlerResult {
    let parameters = result_parameters_map(&payload);
    info!(
        conversation_id = %payload.result.conversation_id,
        result_code = payload.result.result_code,
        parameters = parameters.len(),
        "Daraja result received: {}",
        payload.result.result_desc
    );
    Ok(None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // LOG_FORMAT=json for log shippers, human-readable otherwise
    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::from_env()?;
    let environment = Environment::from_env();

    info!("Starting M-Pesa callback server");
    info!("Environment: {}", environment);

    let receiver = CallbackReceiver::builder()
        .route("/mpesa/stk", stk_push_route(on_stk))
        .route("/mpesa/c2b/confirm", c2b_confirmation_route(on_c2b_confirmation))
        .route("/mpesa/c2b/validate", c2b_validation_route(on_c2b_validation))
        .route("/mpesa/result", daraja_result_route(on_result))
        .build();

    let mut callback_paths: Vec<String> = receiver.paths().map(str::to_string).collect();
    callback_paths.sort();
    for path in &callback_paths {
        info!("Callback route: POST {}", path);
    }

    let health = Arc::new(HealthState {
        environment,
        callback_paths,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(health)
        .merge(receiver.into_router())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
