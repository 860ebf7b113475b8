use std::time::{Duration, Instant};

use shared::domain::{DoorState, RobotState};
use tracing::debug;

use crate::stability::StabilityWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationAction {
    BeginDoorCycle,
    EndDoorCycle,
    BeginRobotCycle,
    EndRobotCycle,
}

/// Turns polled door/robot status into presentation actions. A door cycle
/// never begins while a robot cycle runs and vice versa; the deferred one is
/// picked up as soon as the other ends.
#[derive(Debug, Clone)]
pub struct StatusFollower {
    door: StabilityWindow<DoorState>,
    robot: StabilityWindow<RobotState>,
    door_cycle: bool,
    robot_cycle: bool,
}

impl StatusFollower {
    pub fn new(dwell: Duration) -> Self {
        Self {
            door: StabilityWindow::new(dwell),
            robot: StabilityWindow::new(dwell),
            door_cycle: false,
            robot_cycle: false,
        }
    }

    pub fn door_cycle_active(&self) -> bool {
        self.door_cycle
    }

    pub fn robot_cycle_active(&self) -> bool {
        self.robot_cycle
    }

    pub fn observe(
        &mut self,
        door: DoorState,
        robot: RobotState,
        now: Instant,
    ) -> Vec<PresentationAction> {
        let mut actions = Vec::new();
        let blocked = self.door_cycle && robot == RobotState::Start;
        if let Some(state) = self.robot.observe(robot, now, blocked) {
            self.robot_accepted(state, &mut actions);
        }
        let blocked = self.robot_cycle && door == DoorState::Authorized;
        if let Some(state) = self.door.observe(door, now, blocked) {
            self.door_accepted(state, &mut actions);
        }
        actions
    }

    pub fn poll(&mut self, now: Instant) -> Vec<PresentationAction> {
        let mut actions = Vec::new();
        if let Some(state) = self.robot.poll(now, self.robot_blocked()) {
            self.robot_accepted(state, &mut actions);
        }
        if let Some(state) = self.door.poll(now, self.door_blocked()) {
            self.door_accepted(state, &mut actions);
        }
        actions
    }

    /// Earliest instant at which `poll` could accept something. A blocked
    /// candidate has no deadline until the cycle blocking it ends.
    pub fn next_deadline(&self) -> Option<Instant> {
        let door = self.door.deadline().filter(|_| !self.door_blocked());
        let robot = self.robot.deadline().filter(|_| !self.robot_blocked());
        match (door, robot) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn robot_blocked(&self) -> bool {
        self.door_cycle && self.robot.candidate() == Some(RobotState::Start)
    }

    fn door_blocked(&self) -> bool {
        self.robot_cycle && self.door.candidate() == Some(DoorState::Authorized)
    }

    fn door_accepted(&mut self, state: DoorState, actions: &mut Vec<PresentationAction>) {
        debug!(?state, "door status stable");
        match state {
            DoorState::Authorized if !self.door_cycle => {
                self.door_cycle = true;
                actions.push(PresentationAction::BeginDoorCycle);
            }
            DoorState::Blocked if self.door_cycle => {
                self.door_cycle = false;
                actions.push(PresentationAction::EndDoorCycle);
            }
            _ => {}
        }
    }

    fn robot_accepted(&mut self, state: RobotState, actions: &mut Vec<PresentationAction>) {
        debug!(?state, "robot status stable");
        match state {
            RobotState::Start if !self.robot_cycle => {
                self.robot_cycle = true;
                actions.push(PresentationAction::BeginRobotCycle);
            }
            RobotState::Idle if self.robot_cycle => {
                self.robot_cycle = false;
                actions.push(PresentationAction::EndRobotCycle);
            }
            _ => {}
        }
    }
}

impl Default for StatusFollower {
    fn default() -> Self {
        Self::new(crate::stability::COMMAND_STABILITY_DWELL)
    }
}
