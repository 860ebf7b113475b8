use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        PushEvent, ResetDoorResponse, StatusMessage, StatusSnapshot, DOOR_STATUS_ROUTE, EVENTS_ROUTE,
        RESET_DOOR_STATUS_ROUTE, ROBOT_STATUS_ROUTE, STATUS_ROUTE,
    },
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::{app_state::AppState, relay::RelayError};

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(DOOR_STATUS_ROUTE, get(door_status))
        .route(ROBOT_STATUS_ROUTE, get(robot_status))
        .route(RESET_DOOR_STATUS_ROUTE, post(reset_door_status))
        .route(STATUS_ROUTE, get(status))
        .route(EVENTS_ROUTE, get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn door_status(State(state): State<Arc<AppState>>) -> Json<StatusMessage> {
    Json(StatusMessage::door(state.relay.status().door))
}

async fn robot_status(State(state): State<Arc<AppState>>) -> Json<StatusMessage> {
    Json(StatusMessage::robot(state.relay.status().robot))
}

async fn reset_door_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetDoorResponse>, (StatusCode, Json<ApiError>)> {
    state.relay.reset_door().await.map_err(unavailable)?;
    Ok(Json(ResetDoorResponse {
        success: true,
        message: "Door status reset to BLOCKED".into(),
    }))
}

async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusSnapshot>, (StatusCode, Json<ApiError>)> {
    let snapshot = state.relay.snapshot().await.map_err(unavailable)?;
    Ok(Json(snapshot))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    info!("push client connected");

    let send_task = tokio::spawn(async move {
        while let Some(text) = next_push_frame(&mut events_rx).await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    info!("push client disconnected");
}

/// Next event as a JSON text frame. A client that fell behind skips the
/// events it missed and continues with the oldest one still buffered.
async fn next_push_frame(events_rx: &mut broadcast::Receiver<PushEvent>) -> Option<String> {
    loop {
        let event = match events_rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "push client lagging, events dropped");
                continue;
            }
            Err(RecvError::Closed) => return None,
        };
        match serde_json::to_string(&event) {
            Ok(text) => return Some(text),
            Err(error) => debug!(%error, "push event not serializable"),
        }
    }
}

fn unavailable(error: RelayError) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError::new(ErrorCode::Unavailable, error.to_string())),
    )
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
