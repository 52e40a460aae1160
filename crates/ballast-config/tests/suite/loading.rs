use std::time::Duration;

use ballast_config::{BallastConfig, ByteSize, ConfigError, LoggingConfig, ManagerConfig};
use ballast_memory::{ManagerOptions, GB, MB};
use pretty_assertions::assert_eq;

#[test]
fn empty_config_uses_defaults() {
    let config = BallastConfig::load_from_str("").unwrap();

    assert_eq!(config, BallastConfig::default());
    assert_eq!(config.logging, LoggingConfig::default());
    assert_eq!(
        config.manager,
        ManagerConfig {
            keep_free_mem_percent: 25,
            keep_free_mem_bytes: ByteSize(6 * GB),
            monitoring_interval_ms: 15_000,
            min_resize_interval_ms: 600_000,
            min_resize_threshold: ByteSize(200 * MB),
        }
    );
    assert_eq!(config.manager.manager_options(), ManagerOptions::default());
}

#[test]
fn manager_section_converts_to_options() {
    let text = r#"
[logging]
level = "warn,ballast.memory=debug"
json = true

[manager]
keep_free_mem_percent = 10
keep_free_mem_bytes = "1GiB"
monitoring_interval_ms = 500
min_resize_interval_ms = 60000
min_resize_threshold = "64MiB"
"#;

    let config = BallastConfig::load_from_str(text).unwrap();

    assert!(config.logging.json);
    assert_eq!(config.logging.level, "warn,ballast.memory=debug");
    assert_eq!(
        config.manager.manager_options(),
        ManagerOptions {
            keep_free_mem_percent: 10,
            keep_free_mem_bytes: GB,
            monitoring_interval: Duration::from_millis(500),
            min_resize_interval: Duration::from_secs(60),
            min_resize_threshold: 64 * MB,
        }
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let text = r#"
[manager]
keep_free_percent = 10
"#;

    let err = BallastConfig::load_from_str(text).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "unexpected error: {err:?}");
}

#[test]
fn percent_above_hundred_is_invalid() {
    let text = r#"
[manager]
keep_free_mem_percent = 150
"#;

    let err = BallastConfig::load_from_str(text).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "unexpected error: {err:?}");
    assert!(err.to_string().contains("keep_free_mem_percent"));
}

#[test]
fn zero_monitoring_interval_is_invalid() {
    let text = r#"
[manager]
monitoring_interval_ms = 0
"#;

    assert!(matches!(
        BallastConfig::load_from_str(text),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ballast.toml");
    std::fs::write(&path, "[manager]\nkeep_free_mem_percent = 40\n").unwrap();

    let config = BallastConfig::load_from_path(&path).unwrap();
    assert_eq!(config.manager.keep_free_mem_percent, 40);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");

    let err = BallastConfig::load_from_path(&path).unwrap_err();
    match err {
        ConfigError::Io { path: reported, .. } => {
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("expected io error, got {other:?}"),
    }
}
