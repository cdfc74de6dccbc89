use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use askcrm_gateways::TokenStore;

#[derive(Clone)]
pub struct TokenState {
    pub tokens: Arc<dyn TokenStore>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub present: bool,
}

pub fn router(tokens: Arc<dyn TokenStore>) -> Router {
    Router::new()
        .route("/token", post(set_token))
        .route("/token/status", get(token_status))
        .with_state(TokenState { tokens })
}

pub async fn set_token(
    State(state): State<TokenState>,
    Json(request): Json<TokenRequest>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "token must not be blank"})),
        ));
    }

    state.tokens.set(token.to_string());
    // The token value never reaches the logs.
    info!(event_name = "server.token.updated", "record store access token replaced");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn token_status(State(state): State<TokenState>) -> Json<TokenStatus> {
    Json(TokenStatus { present: state.tokens.get().is_some() })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};

    use askcrm_gateways::{InMemoryTokenStore, TokenStore};

    use super::{set_token, token_status, TokenRequest, TokenState};

    fn state() -> TokenState {
        TokenState { tokens: Arc::new(InMemoryTokenStore::new()) }
    }

    #[tokio::test]
    async fn posted_token_becomes_visible_to_status() {
        let state = state();

        let Json(before) = token_status(State(state.clone())).await;
        assert!(!before.present);

        let status = set_token(
            State(state.clone()),
            Json(TokenRequest { token: "fresh-token".to_string() }),
        )
        .await
        .expect("token must be accepted");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(after) = token_status(State(state.clone())).await;
        assert!(after.present);
        assert_eq!(state.tokens.get().as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn blank_token_is_rejected() {
        let result =
            set_token(State(state()), Json(TokenRequest { token: "  ".to_string() })).await;
        let (status, _) = result.err().expect("blank token must be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
