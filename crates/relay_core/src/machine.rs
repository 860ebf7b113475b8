use std::time::Instant;

use shared::{
    domain::{DoorState, Feedback, RobotState},
    protocol::PushEvent,
};
use tracing::{debug, info, warn};

use crate::{
    command::Command,
    dedup::DuplicateFilter,
    timers::{TimerKind, TimerTable},
    RelayTimings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish a token on the feedback topic.
    Feedback(Feedback),
    /// Fan an event out to every connected client.
    Push(PushEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Duplicate,
    /// Robot-directed block arrived while the door processing window was open.
    Dropped,
    Handled(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub disposition: Disposition,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineStatus {
    pub door: DoorState,
    pub robot: RobotState,
    pub door_processing: bool,
    pub robot_processing: bool,
}

/// Door and robot state for one relay.
///
/// The two processing flags are not stored separately: a flag is set exactly
/// while its completion timer is pending in the [`TimerTable`], so clearing
/// one always clears the other.
#[derive(Debug)]
pub struct RelayMachine {
    timings: RelayTimings,
    filter: DuplicateFilter,
    door: DoorState,
    robot: RobotState,
    command_accepted_at: Option<Instant>,
    timers: TimerTable,
}

impl RelayMachine {
    pub fn new(timings: RelayTimings) -> Self {
        Self {
            timings,
            filter: DuplicateFilter::new(timings.duplicate_window),
            door: DoorState::Blocked,
            robot: RobotState::Idle,
            command_accepted_at: None,
            timers: TimerTable::default(),
        }
    }

    pub fn timings(&self) -> RelayTimings {
        self.timings
    }

    pub fn door_state(&self) -> DoorState {
        self.door
    }

    pub fn robot_state(&self) -> RobotState {
        self.robot
    }

    pub fn door_processing(&self) -> bool {
        self.timers.is_armed(TimerKind::DoorProcessing)
    }

    pub fn robot_processing(&self) -> bool {
        self.timers.is_armed(TimerKind::RobotProcessing)
    }

    pub fn command_accepted_at(&self) -> Option<Instant> {
        self.command_accepted_at
    }

    pub fn status(&self) -> MachineStatus {
        MachineStatus {
            door: self.door,
            robot: self.robot,
            door_processing: self.door_processing(),
            robot_processing: self.robot_processing(),
        }
    }

    pub fn timers(&self) -> &TimerTable {
        &self.timers
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn handle_message(&mut self, topic: &str, payload: &str, now: Instant) -> Outcome {
        if self.filter.is_duplicate(topic, payload, now) {
            debug!(%topic, %payload, "duplicate message suppressed");
            return Outcome {
                disposition: Disposition::Duplicate,
                effects: Vec::new(),
            };
        }

        let command = Command::classify(payload);
        let mut effects = Vec::new();
        match command {
            Command::Authorize => self.authorize_door(now, &mut effects),
            Command::Block => {
                if self.door_processing() {
                    info!(%payload, "door processing active, robot command dropped");
                    return Outcome {
                        disposition: Disposition::Dropped,
                        effects,
                    };
                }
                self.handle_robot_command(now, &mut effects);
            }
            Command::Deny => {
                info!(%payload, "door access denied");
                self.door = DoorState::Blocked;
            }
            Command::Stop => self.stop(&mut effects),
            Command::Unrecognized => warn!(%topic, %payload, "unrecognized payload"),
        }

        effects.push(Effect::Push(PushEvent::MqttMessage {
            topic: topic.to_owned(),
            message: payload.to_owned(),
        }));
        Outcome {
            disposition: Disposition::Handled(command),
            effects,
        }
    }

    /// Unconditionally returns the door to `Blocked`. Pending timers are left
    /// alone.
    pub fn reset_door(&mut self) {
        if self.door != DoorState::Blocked {
            info!("door status reset to blocked");
        }
        self.door = DoorState::Blocked;
    }

    /// Fires every timer due at `now`, earliest first.
    pub fn fire_due(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        while let Some(kind) = self.timers.take_due(now) {
            match kind {
                TimerKind::DoorProcessing => {
                    info!("door processing completed");
                    effects.push(Effect::Feedback(Feedback::DoorProcessingCompleted));
                }
                TimerKind::RobotProcessing => {
                    info!("robot processing completed");
                    self.robot = RobotState::Idle;
                    self.command_accepted_at = None;
                    effects.push(Effect::Feedback(Feedback::RobotCompleted));
                }
                TimerKind::CommandTimeout => {
                    warn!(
                        accepted_at = ?self.command_accepted_at,
                        "robot command never started processing, forcing idle"
                    );
                    self.robot = RobotState::Idle;
                    self.timers.cancel(TimerKind::RobotProcessing);
                    self.command_accepted_at = None;
                    effects.push(Effect::Feedback(Feedback::RobotTimeout));
                }
            }
        }
        effects
    }

    fn authorize_door(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.robot_processing() {
            info!("robot processing active, door authorization ignored");
            effects.push(Effect::Feedback(Feedback::DoorAuthIgnored));
            return;
        }
        info!("door authorized");
        self.door = DoorState::Authorized;
        self.timers
            .arm(TimerKind::DoorProcessing, now + self.timings.door_processing);
    }

    fn handle_robot_command(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.robot_processing() {
            debug!("robot already processing, command ignored");
            return;
        }
        self.accept_robot_command(now);
        self.begin_robot_processing(now, effects);
    }

    /// Records the accepted command and arms the watchdog that forces the
    /// robot back to idle if processing never starts.
    pub(crate) fn accept_robot_command(&mut self, now: Instant) {
        self.command_accepted_at = Some(now);
        if !self.robot_processing() {
            self.timers
                .arm(TimerKind::CommandTimeout, now + self.timings.command_timeout);
        }
    }

    pub(crate) fn begin_robot_processing(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        info!("robot processing started");
        self.robot = RobotState::Start;
        self.timers.cancel(TimerKind::CommandTimeout);
        self.timers
            .arm(TimerKind::RobotProcessing, now + self.timings.robot_processing);
        effects.push(Effect::Push(PushEvent::RobotAnimation {
            duration: duration_millis(self.timings.robot_processing),
        }));
    }

    fn stop(&mut self, effects: &mut Vec<Effect>) {
        info!("stop received, robot forced idle");
        self.robot = RobotState::Idle;
        self.command_accepted_at = None;
        self.timers.cancel_all();
        effects.push(Effect::Feedback(Feedback::RobotStopped));
    }
}

impl Default for RelayMachine {
    fn default() -> Self {
        Self::new(RelayTimings::default())
    }
}

fn duration_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
