use std::sync::{Arc, Mutex};

use super::*;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeRelay {
    door: Arc<Mutex<DoorState>>,
    robot_code: &'static str,
}

async fn fake_door_status(State(state): State<FakeRelay>) -> Json<StatusMessage> {
    Json(StatusMessage::door(*state.door.lock().expect("lock")))
}

async fn fake_robot_status(State(state): State<FakeRelay>) -> Json<StatusMessage> {
    Json(StatusMessage {
        string_message: state.robot_code.to_string(),
    })
}

async fn fake_reset(State(state): State<FakeRelay>) -> Json<ResetDoorResponse> {
    *state.door.lock().expect("lock") = DoorState::Blocked;
    Json(ResetDoorResponse {
        success: true,
        message: "Door status reset to BLOCKED".into(),
    })
}

async fn fake_events(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket| async move {
        use axum::extract::ws::Message;
        for event in [
            PushEvent::MqttMessage {
                topic: "factory/door/command".into(),
                message: "BLOCKED".into(),
            },
            PushEvent::RobotAnimation { duration: 15_000 },
        ] {
            let text = serde_json::to_string(&event).expect("json");
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = socket.send(Message::Text("not json".into())).await;
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn spawn_fake_relay(robot_code: &'static str) -> (String, FakeRelay) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = FakeRelay {
        door: Arc::new(Mutex::new(DoorState::Authorized)),
        robot_code,
    };
    let app = Router::new()
        .route(DOOR_STATUS_ROUTE, get(fake_door_status))
        .route(ROBOT_STATUS_ROUTE, get(fake_robot_status))
        .route(RESET_DOOR_STATUS_ROUTE, post(fake_reset))
        .route(EVENTS_ROUTE, get(fake_events))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

#[test]
fn rejects_non_http_server_url() {
    assert!(matches!(
        RelayClient::new("mqtt://localhost:1883"),
        Err(ClientError::UnsupportedScheme(_))
    ));
    assert!(matches!(
        RelayClient::new("not a url"),
        Err(ClientError::Url(_))
    ));
}

#[tokio::test]
async fn reads_statuses_and_resets_door() {
    let (server_url, state) = spawn_fake_relay("ROBOT_START").await;
    let client = RelayClient::new(&server_url).expect("client");

    assert_eq!(client.door_status().await.expect("door"), DoorState::Authorized);
    assert_eq!(client.robot_status().await.expect("robot"), RobotState::Start);

    let response = client.reset_door_status().await.expect("reset");
    assert!(response.success);
    assert_eq!(*state.door.lock().expect("lock"), DoorState::Blocked);
    assert_eq!(client.door_status().await.expect("door"), DoorState::Blocked);
}

#[tokio::test]
async fn unknown_status_code_is_an_error() {
    let (server_url, _state) = spawn_fake_relay("ROBOT_DANCING").await;
    let client = RelayClient::new(&server_url).expect("client");
    let err = client.robot_status().await.expect_err("should fail");
    assert!(matches!(err, ClientError::UnknownStatus(code) if code == "ROBOT_DANCING"));
}

#[tokio::test]
async fn push_events_are_decoded_until_close() {
    let (server_url, _state) = spawn_fake_relay("ROBOT_IDLE").await;
    let client = RelayClient::new(&server_url).expect("client");
    let events: Vec<PushEvent> = client
        .subscribe_events()
        .await
        .expect("subscribe")
        .collect()
        .await;
    assert_eq!(
        events,
        vec![
            PushEvent::MqttMessage {
                topic: "factory/door/command".into(),
                message: "BLOCKED".into(),
            },
            PushEvent::RobotAnimation { duration: 15_000 },
        ]
    );
}
