use crate::Coordinator;
use crate::http::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientEvent, ConnectionId, ServerEvent, UserIdentity};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Token from `?token=` or, failing that, an `Authorization: Bearer` header.
pub fn bearer_token(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = params.token.as_deref().filter(|t| !t.is_empty()) {
        return Some(token.to_owned());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = bearer_token(&params, &headers) else {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    };
    let identity = match state.coordinator.authenticate(&token) {
        Ok(identity) => identity,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    };

    let coordinator = state.coordinator.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, identity, coordinator))
}

async fn handle_socket(socket: WebSocket, identity: UserIdentity, coordinator: Coordinator) {
    let (connection_id, mut rx) = match coordinator.connect(identity) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to register connection: {}", e);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let coordinator = coordinator.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        handle_text(&coordinator, &connection_id, text.as_str()).await
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    coordinator.disconnect(&connection_id).await;
    info!("WebSocket disconnected: {}", connection_id);
}

async fn handle_text(coordinator: &Coordinator, connection_id: &ConnectionId, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => coordinator.handle(connection_id, event).await,
        Err(e) => {
            warn!("Invalid client event from {}: {}", connection_id, e);
            coordinator
                .registry()
                .send(connection_id, ServerEvent::error(format!("invalid message: {e}")));
        }
    }
}
