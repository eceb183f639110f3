use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::config::Environment;

/// What the health endpoint reports about this process.
#[derive(Debug, Clone)]
pub struct HealthState {
    pub environment: Environment,
    pub callback_paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub callback_paths: Vec<String>,
}

pub async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.to_string(),
        callback_paths: state.callback_paths.clone(),
    })
}
