use std::{fs, path::Path, time::Duration};

use relay_core::RelayTimings;
use rumqttc::MqttOptions;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const SETTINGS_FILE: &str = "relay.toml";
const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid broker url '{url}': {reason}")]
    BrokerUrl { url: String, reason: String },
    #[error("failed to parse {path}: {source}")]
    File {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub mqtt_url: String,
    pub mqtt_client_id: String,
    pub mqtt_keep_alive_secs: u64,
    pub command_topic: String,
    pub feedback_topic: String,
    pub event_buffer: usize,
    pub timings: RelayTimings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:3000".into(),
            mqtt_url: "mqtt://localhost:1883".into(),
            mqtt_client_id: format!("door-relay-{}", uuid::Uuid::new_v4().simple()),
            mqtt_keep_alive_secs: 30,
            command_topic: "factory/door/command".into(),
            feedback_topic: "factory/robot/feedback".into(),
            event_buffer: 256,
            timings: RelayTimings::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    mqtt_url: Option<String>,
    mqtt_client_id: Option<String>,
    mqtt_keep_alive_secs: Option<u64>,
    command_topic: Option<String>,
    feedback_topic: Option<String>,
    event_buffer: Option<usize>,
    #[serde(default)]
    timings: FileTimings,
}

#[derive(Debug, Default, Deserialize)]
struct FileTimings {
    duplicate_window_ms: Option<u64>,
    command_timeout_ms: Option<u64>,
    robot_processing_ms: Option<u64>,
    door_processing_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn broker_address(&self) -> Result<BrokerAddress, ConfigError> {
        parse_broker_url(&self.mqtt_url)
    }

    pub fn mqtt_options(&self) -> Result<MqttOptions, ConfigError> {
        let address = self.broker_address()?;
        let mut options = MqttOptions::new(&self.mqtt_client_id, address.host, address.port);
        options.set_keep_alive(Duration::from_secs(self.mqtt_keep_alive_secs.max(5)));
        Ok(options)
    }
}

/// Defaults, then `relay.toml` from the working directory, then the process
/// environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file_cfg: FileSettings = toml::from_str(&raw).map_err(|source| ConfigError::File {
            path: path.display().to_string(),
            source,
        })?;
        apply_file(&mut settings, file_cfg);
    }

    if let Some(v) = env("RELAY_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = env("MQTT_URL") {
        settings.mqtt_url = v;
    }
    if let Some(v) = env("MQTT_CLIENT_ID") {
        settings.mqtt_client_id = v;
    }
    if let Some(v) = env("MQTT_COMMAND_TOPIC") {
        settings.command_topic = v;
    }
    if let Some(v) = env("MQTT_FEEDBACK_TOPIC") {
        settings.feedback_topic = v;
    }
    if let Some(v) = env("MQTT_KEEP_ALIVE_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.mqtt_keep_alive_secs = parsed;
        }
    }

    settings.broker_address()?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.mqtt_url {
        settings.mqtt_url = v;
    }
    if let Some(v) = file_cfg.mqtt_client_id {
        settings.mqtt_client_id = v;
    }
    if let Some(v) = file_cfg.mqtt_keep_alive_secs {
        settings.mqtt_keep_alive_secs = v;
    }
    if let Some(v) = file_cfg.command_topic {
        settings.command_topic = v;
    }
    if let Some(v) = file_cfg.feedback_topic {
        settings.feedback_topic = v;
    }
    if let Some(v) = file_cfg.event_buffer {
        settings.event_buffer = v.max(1);
    }

    let timings = &mut settings.timings;
    if let Some(ms) = file_cfg.timings.duplicate_window_ms {
        timings.duplicate_window = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.timings.command_timeout_ms {
        timings.command_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.timings.robot_processing_ms {
        timings.robot_processing = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.timings.door_processing_ms {
        timings.door_processing = Duration::from_millis(ms);
    }
}

fn parse_broker_url(raw: &str) -> Result<BrokerAddress, ConfigError> {
    let invalid = |reason: &str| ConfigError::BrokerUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(invalid("scheme must be mqtt:// or tcp://"));
    }
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid("missing host"))?;

    Ok(BrokerAddress {
        host: host.to_string(),
        port: url.port().unwrap_or(DEFAULT_MQTT_PORT),
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
