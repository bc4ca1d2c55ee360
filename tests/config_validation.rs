//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used)]

use rcon_supervisor::config::{
    ClientConfig, LoggingConfig, RconConfig, SupervisorConfig, DEFAULT_KEEPALIVE_COMMAND,
    DEFAULT_MAX_PAYLOAD_SIZE,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = RconConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_defaults_match_console_expectations() {
    let config = RconConfig::default();
    assert_eq!(config.client.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.client.idle_timeout, Duration::from_secs(30));
    assert_eq!(config.client.command_timeout, Duration::from_secs(15));
    assert_eq!(config.client.keepalive_interval, Duration::from_secs(20));
    assert_eq!(config.client.keepalive_command, DEFAULT_KEEPALIVE_COMMAND);
    assert_eq!(config.client.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    assert_eq!(config.supervisor.sweep_interval, Duration::from_secs(5));
}

#[test]
fn test_short_command_timeout() {
    let mut config = RconConfig::default();
    config.client.command_timeout = Duration::from_millis(5);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Command timeout too short")));
}

#[test]
fn test_keepalive_must_beat_idle_timeout() {
    let mut config = RconConfig::default();
    config.client.keepalive_interval = Duration::from_secs(30);
    config.client.idle_timeout = Duration::from_secs(30);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("must be shorter than the idle timeout")));
}

#[test]
fn test_empty_keepalive_command() {
    let mut config = RconConfig::default();
    config.client.keepalive_command = "   ".to_string();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Keep-alive command cannot be empty")));
}

#[test]
fn test_zero_max_payload_size() {
    let mut config = RconConfig::default();
    config.client.max_payload_size = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max payload size cannot be 0")));
}

#[test]
fn test_excessive_max_payload_size() {
    let mut config = RconConfig::default();
    config.client.max_payload_size = 200 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max payload size too large")));
}

#[test]
fn test_sweep_interval_bounds() {
    let mut config = RconConfig::default();
    config.supervisor.sweep_interval = Duration::from_millis(1);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Sweep interval too short")));

    config.supervisor.sweep_interval = Duration::from_secs(7200);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Sweep interval too long")));
}

#[test]
fn test_zero_status_capacity() {
    let mut config = RconConfig::default();
    config.supervisor.status_channel_capacity = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Status channel capacity must be greater than 0")));
}

#[test]
fn test_empty_app_name() {
    let mut config = RconConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = RconConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = RconConfig::default();
    config.client.keepalive_command = String::new();

    let result = config.validate_strict();
    assert!(result.is_err());

    if let Err(e) = result {
        let error_str = e.to_string();
        assert!(error_str.contains("Configuration validation failed"));
    }
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = RconConfig::default();

    config.client.connect_timeout = Duration::ZERO;
    config.client.max_payload_size = 0;
    config.supervisor.status_channel_capacity = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 4,
        "Expected at least 4 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = RconConfig::from_toml(
        r#"
        [client]
        command_timeout = 5000
        keepalive_command = "listplayers"

        [logging]
        log_level = "debug"
        json_format = true
        "#,
    )
    .expect("valid toml");

    assert_eq!(config.client.command_timeout, Duration::from_secs(5));
    assert_eq!(config.client.keepalive_command, "listplayers");
    assert_eq!(config.client.idle_timeout, Duration::from_secs(30));
    assert_eq!(config.supervisor.sweep_interval, Duration::from_secs(5));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = RconConfig::from_toml("[client]\ncommand_timeout = \"soon\"");
    let err = result.expect_err("string duration must be rejected");
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_example_config_parses_back() {
    let text = RconConfig::example_config();
    let config = RconConfig::from_toml(&text).expect("example config must parse");
    assert!(config.validate().is_empty());
}

#[test]
fn test_env_overrides() {
    std::env::set_var("RCON_COMMAND_TIMEOUT_MS", "2500");
    std::env::set_var("RCON_LOG_LEVEL", "warn");
    let config = RconConfig::from_env().expect("env config");
    std::env::remove_var("RCON_COMMAND_TIMEOUT_MS");
    std::env::remove_var("RCON_LOG_LEVEL");

    assert_eq!(config.client.command_timeout, Duration::from_millis(2500));
    assert_eq!(config.logging.log_level, Level::WARN);
}

#[test]
fn test_valid_production_config() {
    let config = RconConfig {
        client: ClientConfig {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            auth_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(20),
            keepalive_interval: Duration::from_secs(25),
            keepalive_command: "getchat".to_string(),
            max_payload_size: 4 * 1024 * 1024,
        },
        supervisor: SupervisorConfig {
            sweep_interval: Duration::from_secs(10),
            status_channel_capacity: 256,
        },
        logging: LoggingConfig {
            app_name: "ark-admin".to_string(),
            log_level: Level::INFO,
            json_format: true,
        },
    };

    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Production config should be valid, got: {:?}",
        errors
    );
}

#[test]
fn test_from_file_reads_toml_from_disk() {
    let path = std::env::temp_dir().join(format!("rcon-config-{}.toml", std::process::id()));
    std::fs::write(&path, "[client]\nkeepalive_command = \"getchat\"\n").expect("write config");

    let loaded = RconConfig::from_file(&path);
    std::fs::remove_file(&path).expect("remove config");

    let config = loaded.expect("config file must load");
    assert_eq!(config.client.keepalive_command, "getchat");
    assert_eq!(config.client.command_timeout, Duration::from_secs(15));

    let missing = RconConfig::from_file(std::env::temp_dir().join("rcon-config-missing.toml"));
    assert!(missing
        .expect_err("missing file is a config error")
        .to_string()
        .contains("Failed to open config file"));
}
