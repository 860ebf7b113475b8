use std::time::Instant as StdInstant;

use chrono::Utc;
use relay_core::{Disposition, Effect, MachineStatus, RelayMachine};
use shared::{
    domain::{DoorState, Feedback},
    protocol::{PushEvent, StatusSnapshot},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info};

const INPUT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay task has stopped")]
    Stopped,
}

/// Outbound side of the broker adapter. Implementations must not block:
/// delivery is best-effort and failures are logged by the sink.
pub trait FeedbackSink: Send + Sync + 'static {
    fn publish(&self, feedback: Feedback);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
    /// Taken when the broker delivered the message; the duplicate window is
    /// measured from here, not from when the relay gets to it.
    pub received_at: StdInstant,
}

enum RelayInput {
    Broker(InboundMessage),
    ResetDoor { reply: oneshot::Sender<StatusSnapshot> },
    Snapshot { reply: oneshot::Sender<StatusSnapshot> },
}

#[derive(Clone)]
pub struct RelayHandle {
    inputs: mpsc::Sender<RelayInput>,
    status: watch::Receiver<StatusSnapshot>,
}

impl RelayHandle {
    pub async fn submit(&self, message: InboundMessage) -> Result<(), RelayError> {
        self.inputs
            .send(RelayInput::Broker(message))
            .await
            .map_err(|_| RelayError::Stopped)
    }

    /// Returns the door to blocked once every earlier input has been handled.
    pub async fn reset_door(&self) -> Result<StatusSnapshot, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.inputs
            .send(RelayInput::ResetDoor { reply })
            .await
            .map_err(|_| RelayError::Stopped)?;
        rx.await.map_err(|_| RelayError::Stopped)
    }

    /// Snapshot ordered after every input submitted so far.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.inputs
            .send(RelayInput::Snapshot { reply })
            .await
            .map_err(|_| RelayError::Stopped)?;
        rx.await.map_err(|_| RelayError::Stopped)
    }

    /// Latest published snapshot, without queueing behind pending inputs.
    pub fn status(&self) -> StatusSnapshot {
        *self.status.borrow()
    }
}

/// Single owner of the [`RelayMachine`]. Every input and timer expiry is
/// handled to completion before the next one is looked at.
struct RelayActor<S> {
    machine: RelayMachine,
    sink: S,
    events: broadcast::Sender<PushEvent>,
    inputs: mpsc::Receiver<RelayInput>,
    status: watch::Sender<StatusSnapshot>,
}

pub fn spawn_relay<S: FeedbackSink>(
    machine: RelayMachine,
    sink: S,
    events: broadcast::Sender<PushEvent>,
) -> (RelayHandle, JoinHandle<()>) {
    let (inputs_tx, inputs) = mpsc::channel(INPUT_BUFFER);
    let (status, status_rx) = watch::channel(snapshot_of(machine.status()));
    let actor = RelayActor {
        machine,
        sink,
        events,
        inputs,
        status,
    };
    let task = tokio::spawn(actor.run());
    (
        RelayHandle {
            inputs: inputs_tx,
            status: status_rx,
        },
        task,
    )
}

impl<S: FeedbackSink> RelayActor<S> {
    async fn run(mut self) {
        info!("relay started");
        loop {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    let effects = self.machine.fire_due(now());
                    self.apply(effects);
                }
            }
            self.publish_status();
        }
        info!("relay stopped");
    }

    fn handle_input(&mut self, input: RelayInput) {
        match input {
            RelayInput::Broker(message) => {
                // Timers that were due before the message arrived go first.
                let effects = self.machine.fire_due(message.received_at);
                self.apply(effects);
                let outcome = self.machine.handle_message(
                    &message.topic,
                    &message.payload,
                    message.received_at,
                );
                if matches!(outcome.disposition, Disposition::Handled(_)) {
                    debug!(
                        topic = %message.topic,
                        payload = %message.payload,
                        retained = message.retained,
                        disposition = ?outcome.disposition,
                        "broker message handled"
                    );
                }
                self.apply(outcome.effects);
            }
            RelayInput::ResetDoor { reply } => {
                self.machine.reset_door();
                self.publish_status();
                let _ = reply.send(*self.status.borrow());
            }
            RelayInput::Snapshot { reply } => {
                self.publish_status();
                let _ = reply.send(*self.status.borrow());
            }
        }
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Feedback(feedback) => self.sink.publish(feedback),
                Effect::Push(event) => {
                    let _ = self.events.send(event);
                }
            }
        }
    }

    fn publish_status(&self) {
        let current = self.machine.status();
        self.status.send_if_modified(|snapshot| {
            if status_of(snapshot) == current {
                return false;
            }
            if snapshot.door != current.door && current.door == DoorState::Authorized {
                info!("door status now authorized");
            }
            *snapshot = snapshot_of(current);
            true
        });
    }
}

fn now() -> StdInstant {
    Instant::now().into_std()
}

async fn sleep_until(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn status_of(snapshot: &StatusSnapshot) -> MachineStatus {
    MachineStatus {
        door: snapshot.door,
        robot: snapshot.robot,
        door_processing: snapshot.door_processing,
        robot_processing: snapshot.robot_processing,
    }
}

fn snapshot_of(status: MachineStatus) -> StatusSnapshot {
    StatusSnapshot {
        door: status.door,
        robot: status.robot,
        door_processing: status.door_processing,
        robot_processing: status.robot_processing,
        changed_at: Utc::now(),
    }
}


#[cfg(test)]
#[path = "tests/relay_tests.rs"]
mod tests;
