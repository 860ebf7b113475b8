use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    PresentationAction, RelayClient, StatusFollower, StatusSource, COMMAND_STABILITY_DWELL_MS,
};
use futures::StreamExt;
use shared::{
    domain::{DoorState, RobotState},
    protocol::PushEvent,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Follows a door relay the way a presentation client does: polls status,
/// debounces it, reacts to push events and acknowledges authorized cycles.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server_url: String,
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
    #[arg(long, default_value_t = COMMAND_STABILITY_DWELL_MS)]
    dwell_ms: u64,
    /// How long the door cycle runs before it is acknowledged.
    #[arg(long, default_value_t = 3_000)]
    door_cycle_ms: u64,
    /// Observe only; never call reset-door-status.
    #[arg(long)]
    no_reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let client = RelayClient::new(&args.server_url).context("invalid --server-url")?;
    let mut events = client
        .subscribe_events()
        .await
        .with_context(|| format!("failed to open push channel at {}", client.base_url()))?;
    let mut events_open = true;
    info!(server = %client.base_url(), "monitor connected");

    let mut follower = StatusFollower::new(Duration::from_millis(args.dwell_ms));
    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms.max(50)));
    let mut door_cycle_end: Option<tokio::time::Instant> = None;

    loop {
        let dwell_deadline = follower.next_deadline();
        let actions = tokio::select! {
            _ = poll.tick() => match poll_status(&client).await {
                Some((door, robot)) => follower.observe(door, robot, Instant::now()),
                None => Vec::new(),
            },
            _ = sleep_until(dwell_deadline.map(tokio::time::Instant::from_std)) => {
                follower.poll(Instant::now())
            }
            _ = sleep_until(door_cycle_end) => {
                door_cycle_end = None;
                if !args.no_reset {
                    acknowledge_door_cycle(&client).await;
                }
                Vec::new()
            }
            event = events.next(), if events_open => {
                match event {
                    Some(event) => log_event(&event),
                    None => {
                        warn!("push channel closed; continuing with polling only");
                        events_open = false;
                    }
                }
                Vec::new()
            }
            _ = tokio::signal::ctrl_c() => break,
        };

        for action in actions {
            info!(?action, "presentation action");
            if action == PresentationAction::BeginDoorCycle {
                door_cycle_end = Some(
                    tokio::time::Instant::now() + Duration::from_millis(args.door_cycle_ms),
                );
            }
        }
    }

    Ok(())
}

async fn poll_status(client: &RelayClient) -> Option<(DoorState, RobotState)> {
    let door = client.door_status().await;
    let robot = client.robot_status().await;
    match (door, robot) {
        (Ok(door), Ok(robot)) => Some((door, robot)),
        (Err(error), _) | (_, Err(error)) => {
            warn!(%error, "status poll failed");
            None
        }
    }
}

async fn acknowledge_door_cycle(client: &RelayClient) {
    match client.reset_door_status().await {
        Ok(response) => info!(message = %response.message, "door cycle acknowledged"),
        Err(error) => warn!(%error, "door reset failed"),
    }
}

fn log_event(event: &PushEvent) {
    match event {
        PushEvent::MqttMessage { topic, message } => info!(%topic, %message, "relay message"),
        PushEvent::RobotAnimation { duration } => {
            info!(duration_ms = *duration, "robot animation triggered")
        }
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
