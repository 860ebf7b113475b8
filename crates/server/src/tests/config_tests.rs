use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("door_relay_config_test_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings =
        load_settings_from(Path::new("/nonexistent/relay.toml"), no_env).expect("settings");
    assert_eq!(settings.server_bind, "0.0.0.0:3000");
    assert_eq!(settings.command_topic, "factory/door/command");
    assert_eq!(settings.feedback_topic, "factory/robot/feedback");
    assert!(settings.mqtt_client_id.starts_with("door-relay-"));
    assert_eq!(settings.timings, RelayTimings::default());
    assert_eq!(settings.timings.duplicate_window, Duration::from_millis(2_000));
    assert_eq!(settings.timings.door_processing, Duration::from_millis(10_000));
}

#[test]
fn file_values_override_defaults_and_env_overrides_file() {
    let path = temp_file(
        "relay.toml",
        r#"
bind_addr = "127.0.0.1:9000"
mqtt_url = "mqtt://broker.local:1884"
command_topic = "lab/door"

[timings]
door_processing_ms = 500
"#,
    );
    let env: HashMap<&str, &str> = HashMap::from([
        ("APP__BIND_ADDR", "127.0.0.1:9100"),
        ("MQTT_FEEDBACK_TOPIC", "lab/feedback"),
    ]);

    let settings = load_settings_from(&path, |key| env.get(key).map(|v| v.to_string()))
        .expect("settings");
    assert_eq!(settings.server_bind, "127.0.0.1:9100");
    assert_eq!(settings.command_topic, "lab/door");
    assert_eq!(settings.feedback_topic, "lab/feedback");
    assert_eq!(settings.timings.door_processing, Duration::from_millis(500));
    assert_eq!(settings.timings.robot_processing, Duration::from_millis(15_000));
    assert_eq!(
        settings.broker_address().expect("address"),
        BrokerAddress {
            host: "broker.local".into(),
            port: 1884
        }
    );

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn malformed_file_is_reported() {
    let path = temp_file("relay.toml", "bind_addr = [");
    let err = load_settings_from(&path, no_env).expect_err("should fail");
    assert!(matches!(err, ConfigError::File { .. }));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn broker_url_defaults_port() {
    assert_eq!(
        parse_broker_url("mqtt://10.0.0.5").expect("address"),
        BrokerAddress {
            host: "10.0.0.5".into(),
            port: 1883
        }
    );
    assert_eq!(
        parse_broker_url("tcp://broker:2883").expect("address").port,
        2883
    );
}

#[test]
fn broker_url_rejects_unsupported_scheme() {
    assert!(matches!(
        parse_broker_url("http://broker:1883"),
        Err(ConfigError::BrokerUrl { .. })
    ));
    assert!(parse_broker_url("not a url").is_err());
}

#[test]
fn invalid_env_broker_url_fails_load() {
    let err = load_settings_from(Path::new("/nonexistent/relay.toml"), |key| {
        (key == "MQTT_URL").then(|| "ws://broker".to_string())
    })
    .expect_err("should fail");
    assert!(matches!(err, ConfigError::BrokerUrl { .. }));
}
