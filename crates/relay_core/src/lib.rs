//! Door/robot relay state machine.
//!
//! Everything in this crate is synchronous and free of I/O. Callers pass the
//! current [`Instant`](std::time::Instant) into every operation and carry out
//! the returned [`Effect`]s themselves; timers are deadlines kept inside the
//! machine and fired through [`RelayMachine::fire_due`].

pub mod command;
pub mod dedup;
pub mod machine;
pub mod timers;

use std::time::Duration;

pub use command::Command;
pub use dedup::{DuplicateFilter, TopicMessageRecord};
pub use machine::{Disposition, Effect, MachineStatus, Outcome, RelayMachine};
pub use timers::{TimerKind, TimerTable};

pub const DUPLICATE_WINDOW: Duration = Duration::from_millis(2_000);
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const ROBOT_PROCESSING_DURATION: Duration = Duration::from_millis(15_000);
pub const DOOR_PROCESSING_DURATION: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTimings {
    pub duplicate_window: Duration,
    pub command_timeout: Duration,
    pub robot_processing: Duration,
    pub door_processing: Duration,
}

impl Default for RelayTimings {
    fn default() -> Self {
        Self {
            duplicate_window: DUPLICATE_WINDOW,
            command_timeout: COMMAND_TIMEOUT,
            robot_processing: ROBOT_PROCESSING_DURATION,
            door_processing: DOOR_PROCESSING_DURATION,
        }
    }
}
