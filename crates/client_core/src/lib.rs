//! Presentation-side client for the door relay: REST status queries, the
//! door reset acknowledgment, the push-event channel and the debouncing used
//! before reacting to a status change.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::{
    domain::{DoorState, RobotState},
    protocol::{
        PushEvent, ResetDoorResponse, StatusMessage, StatusSnapshot, DOOR_STATUS_ROUTE,
        EVENTS_ROUTE, RESET_DOOR_STATUS_ROUTE, ROBOT_STATUS_ROUTE, STATUS_ROUTE,
    },
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

pub mod error;
pub mod follower;
pub mod stability;

pub use error::ClientError;
pub use follower::{PresentationAction, StatusFollower};
pub use stability::{StabilityWindow, COMMAND_STABILITY_DWELL, COMMAND_STABILITY_DWELL_MS};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 64;

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn door_status(&self) -> Result<DoorState, ClientError>;
    async fn robot_status(&self) -> Result<RobotState, ClientError>;
    async fn reset_door_status(&self) -> Result<ResetDoorResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(server_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::UnsupportedScheme(base_url.scheme().to_string()));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn snapshot(&self) -> Result<StatusSnapshot, ClientError> {
        let snapshot = self
            .http
            .get(self.endpoint(STATUS_ROUTE)?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot)
    }

    /// Opens the push channel. The stream ends when the server closes the
    /// connection; events missed while disconnected are not replayed.
    pub async fn subscribe_events(&self) -> Result<ReceiverStream<PushEvent>, ClientError> {
        let mut ws_url = self.endpoint(EVENTS_ROUTE)?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        ws_url
            .set_scheme(scheme)
            .map_err(|_| ClientError::UnsupportedScheme(scheme.to_string()))?;

        let (socket, _) = connect_async(ws_url.as_str()).await?;
        let (sink, mut stream) = socket.split();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let _sink = sink;
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<PushEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => warn!(%error, "undecodable push event"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "push channel error");
                        break;
                    }
                }
            }
            debug!("push channel closed");
        });

        Ok(ReceiverStream::new(rx))
    }

    fn endpoint(&self, route: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(route)?)
    }

    async fn status_code(&self, route: &str) -> Result<String, ClientError> {
        let body: StatusMessage = self
            .http
            .get(self.endpoint(route)?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.string_message)
    }
}

#[async_trait]
impl StatusSource for RelayClient {
    async fn door_status(&self) -> Result<DoorState, ClientError> {
        let code = self.status_code(DOOR_STATUS_ROUTE).await?;
        DoorState::from_status_code(&code).ok_or(ClientError::UnknownStatus(code))
    }

    async fn robot_status(&self) -> Result<RobotState, ClientError> {
        let code = self.status_code(ROBOT_STATUS_ROUTE).await?;
        RobotState::from_status_code(&code).ok_or(ClientError::UnknownStatus(code))
    }

    async fn reset_door_status(&self) -> Result<ResetDoorResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint(RESET_DOOR_STATUS_ROUTE)?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/follower_tests.rs"]
mod follower_tests;
