use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DoorState, RobotState};

pub const DOOR_STATUS_ROUTE: &str = "/api/door-status";
pub const ROBOT_STATUS_ROUTE: &str = "/api/robot-status";
pub const RESET_DOOR_STATUS_ROUTE: &str = "/api/reset-door-status";
pub const STATUS_ROUTE: &str = "/api/status";
pub const EVENTS_ROUTE: &str = "/ws";

/// Event pushed to every connected presentation client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PushEvent {
    MqttMessage { topic: String, message: String },
    RobotAnimation { duration: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub string_message: String,
}

impl StatusMessage {
    pub fn door(state: DoorState) -> Self {
        Self {
            string_message: state.status_code().to_string(),
        }
    }

    pub fn robot(state: RobotState) -> Self {
        Self {
            string_message: state.status_code().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetDoorResponse {
    pub success: bool,
    pub message: String,
}

/// Whole-step view of the relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub door: DoorState,
    pub robot: RobotState,
    pub door_processing: bool,
    pub robot_processing: bool,
    pub changed_at: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            door: DoorState::Blocked,
            robot: RobotState::Idle,
            door_processing: false,
            robot_processing: false,
            changed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_uses_camel_case_field() {
        let json = serde_json::to_value(StatusMessage::door(DoorState::Authorized)).expect("json");
        assert_eq!(json, serde_json::json!({ "stringMessage": "DOOR_AUTHORIZED" }));

        let json = serde_json::to_value(StatusMessage::robot(RobotState::Idle)).expect("json");
        assert_eq!(json, serde_json::json!({ "stringMessage": "ROBOT_IDLE" }));
    }

    #[test]
    fn push_events_are_tagged() {
        let event = PushEvent::MqttMessage {
            topic: "factory/door/command".into(),
            message: "Authorized".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).expect("json"),
            serde_json::json!({
                "type": "mqtt_message",
                "payload": { "topic": "factory/door/command", "message": "Authorized" }
            })
        );

        let event = PushEvent::RobotAnimation { duration: 15_000 };
        assert_eq!(
            serde_json::to_value(&event).expect("json"),
            serde_json::json!({ "type": "robot_animation", "payload": { "duration": 15000 } })
        );
    }
}
