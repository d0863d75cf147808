use crate::Coordinator;
use crate::signaling::ws_handler;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use huddle_core::UserId;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub internal_api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(coordinator: Coordinator, internal_api_key: Option<String>) -> Self {
        Self {
            coordinator,
            internal_api_key: internal_api_key.map(Arc::from),
        }
    }
}

/// `GET /ws`, `GET /health` and `POST /notify/{user_id}`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/notify/{user_id}", post(notify))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.coordinator.connection_count(),
        "rooms": state.coordinator.room_count(),
    }))
}

async fn notify(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let Some(key) = state.internal_api_key.as_deref() else {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "notifications disabled"})));
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if presented != Some(key) {
        warn!("Rejected notification for {}: bad internal key", user_id);
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let delivered = state
        .coordinator
        .notify_user(&UserId::from(user_id), payload);
    (StatusCode::OK, Json(json!({ "delivered": delivered })))
}
