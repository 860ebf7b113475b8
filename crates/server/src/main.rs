use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use relay_core::RelayMachine;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod broker;
mod config;
mod relay;

use app_state::AppState;
use broker::MqttFeedback;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings().context("failed to load relay settings")?;
    let (client, eventloop) = broker::connect(settings.mqtt_options()?);
    let (events, _) = broadcast::channel(settings.event_buffer);

    let (relay, relay_task) = relay::spawn_relay(
        RelayMachine::new(settings.timings),
        MqttFeedback::new(client.clone(), settings.feedback_topic.clone()),
        events.clone(),
    );
    info!(
        broker = %settings.mqtt_url,
        command_topic = %settings.command_topic,
        feedback_topic = %settings.feedback_topic,
        "connecting to broker"
    );
    let ingress = tokio::spawn(broker::run_ingress(
        eventloop,
        client,
        settings.command_topic.clone(),
        relay.clone(),
    ));

    let app = api::build_router(Arc::new(AppState { relay, events }));
    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    ingress.abort();
    relay_task.abort();
    Ok(())
}
