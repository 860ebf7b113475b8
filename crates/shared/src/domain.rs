use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    #[default]
    Blocked,
    Authorized,
}

impl DoorState {
    /// External code reported by the door-status endpoint.
    pub fn status_code(self) -> &'static str {
        match self {
            DoorState::Blocked => "DOOR_BLOCKED",
            DoorState::Authorized => "DOOR_AUTHORIZED",
        }
    }

    pub fn from_status_code(code: &str) -> Option<Self> {
        match code {
            "DOOR_BLOCKED" => Some(DoorState::Blocked),
            "DOOR_AUTHORIZED" => Some(DoorState::Authorized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotState {
    #[default]
    Idle,
    Start,
}

impl RobotState {
    pub fn status_code(self) -> &'static str {
        match self {
            RobotState::Idle => "ROBOT_IDLE",
            RobotState::Start => "ROBOT_START",
        }
    }

    pub fn from_status_code(code: &str) -> Option<Self> {
        match code {
            "ROBOT_IDLE" => Some(RobotState::Idle),
            "ROBOT_START" => Some(RobotState::Start),
            _ => None,
        }
    }
}

/// Status tokens published on the feedback topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feedback {
    DoorAuthIgnored,
    DoorProcessingCompleted,
    RobotCompleted,
    RobotTimeout,
    RobotStopped,
}

impl Feedback {
    pub fn as_str(self) -> &'static str {
        match self {
            Feedback::DoorAuthIgnored => "DOOR_AUTH_IGNORED",
            Feedback::DoorProcessingCompleted => "DOOR_PROCESSING_COMPLETED",
            Feedback::RobotCompleted => "ROBOT_COMPLETED",
            Feedback::RobotTimeout => "ROBOT_TIMEOUT",
            Feedback::RobotStopped => "ROBOT_STOPPED",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
