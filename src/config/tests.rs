use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::*;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "localhost");
    assert_eq!(settings.server.port, 5000);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.max_payload_len, 65535);
    assert_eq!(settings.broker.max_queued_frames, 1024);
    assert_eq!(settings.log.level, "info");
    assert_eq!(settings.addr(), "localhost:5000");
}

#[test]
fn test_merge_keeps_defaults_for_missing_values() {
    let partial = PartialSettings {
        server: Some(settings::PartialServerSettings {
            host: None,
            port: Some(7000),
        }),
        ..PartialSettings::default()
    };
    let settings = Settings::merged(partial);
    assert_eq!(settings.server.host, "localhost");
    assert_eq!(settings.server.port, 7000);
    assert_eq!(settings.broker, Settings::default().broker);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");
    let settings = load_config_from(path.to_str().unwrap()).expect("load_config_from failed");
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("broker.toml");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        max_connections = 10
    "#;
    fs::write(&path, toml).expect("write config file");

    let settings = load_config_from(path.to_str().unwrap()).expect("load_config_from failed");
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 9000);
    assert_eq!(settings.broker.max_connections, 10);
    assert_eq!(settings.broker.max_payload_len, 65535);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("broker.toml");
    fs::write(&path, "[server]\nport = 9000\n").expect("write config file");

    temp_env::with_vars(
        [
            ("TOPICBUS__SERVER__PORT", Some("6000")),
            ("TOPICBUS__BROKER__MAX_CONNECTIONS", Some("3")),
            ("TOPICBUS__BROKER__MAX_QUEUED_FRAMES", Some("16")),
            ("TOPICBUS__LOG__LEVEL", Some("debug")),
        ],
        || {
            let settings =
                load_config_from(path.to_str().unwrap()).expect("load_config_from failed");
            assert_eq!(settings.server.port, 6000);
            assert_eq!(settings.broker.max_connections, 3);
            assert_eq!(settings.broker.max_queued_frames, 16);
            assert_eq!(settings.log.level, "debug");
        },
    );
}
