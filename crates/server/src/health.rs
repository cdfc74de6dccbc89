use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use askcrm_gateways::TokenStore;

#[derive(Clone)]
pub struct HealthState {
    tokens: Arc<dyn TokenStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub record_store_token: HealthCheck,
}

pub fn router(tokens: Arc<dyn TokenStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { tokens })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let record_store_token = token_check(state.tokens.as_ref());
    let ready = record_store_token.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "askcrm-server runtime initialized".to_string(),
        },
        record_store_token,
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn token_check(tokens: &dyn TokenStore) -> HealthCheck {
    if tokens.get().is_some() {
        HealthCheck { status: "ready", detail: "record store token is present".to_string() }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "no record store token has been provided".to_string(),
        }
    }
}
