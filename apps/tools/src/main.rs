use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{RelayClient, StatusSource};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use url::Url;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a raw command payload to the relay's inbound topic.
    Publish {
        payload: String,
        #[arg(long, default_value = "mqtt://localhost:1883")]
        mqtt_url: String,
        #[arg(long, default_value = "factory/door/command")]
        topic: String,
        #[arg(long)]
        retain: bool,
    },
    /// Print door and robot status codes.
    Status,
    /// Print the full relay snapshot as JSON.
    Snapshot,
    /// Reset the door to blocked.
    ResetDoor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Publish {
            payload,
            mqtt_url,
            topic,
            retain,
        } => {
            publish(&mqtt_url, &topic, &payload, retain).await?;
            println!("published '{payload}' to {topic}");
        }
        Command::Status => {
            let client = RelayClient::new(&cli.server_url)?;
            let door = client.door_status().await?;
            let robot = client.robot_status().await?;
            println!("door={} robot={}", door.status_code(), robot.status_code());
        }
        Command::Snapshot => {
            let client = RelayClient::new(&cli.server_url)?;
            let snapshot = client.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::ResetDoor => {
            let client = RelayClient::new(&cli.server_url)?;
            let response = client.reset_door_status().await?;
            println!("success={} message={}", response.success, response.message);
        }
    }

    Ok(())
}

async fn publish(mqtt_url: &str, topic: &str, payload: &str, retain: bool) -> Result<()> {
    let url = Url::parse(mqtt_url).with_context(|| format!("invalid broker url '{mqtt_url}'"))?;
    let host = url.host_str().context("broker url has no host")?;
    let port = url.port().unwrap_or(1883);
    let client_id = format!("door-relay-tools-{}", uuid::Uuid::new_v4().simple());
    let options = MqttOptions::new(client_id, host, port);

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    client
        .publish(topic, QoS::AtLeastOnce, retain, payload.as_bytes().to_vec())
        .await?;

    let acked = tokio::time::timeout(PUBLISH_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                Ok(_) => {}
                Err(error) => return Err(error),
            }
        }
    })
    .await;

    match acked {
        Ok(Ok(())) => {
            let _ = client.try_disconnect();
            Ok(())
        }
        Ok(Err(error)) => Err(error).context("broker connection failed"),
        Err(_) => bail!("broker did not acknowledge publish within {PUBLISH_TIMEOUT:?}"),
    }
}
