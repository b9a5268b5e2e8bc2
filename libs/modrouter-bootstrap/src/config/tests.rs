use super::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = WorkerConfig::default();

    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.database.acquire_timeout, Duration::from_secs(30));
    assert_eq!(config.scheduler.interval, Duration::from_secs(900));
    assert!(config.scheduler.midnight);

    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "info");
    assert_eq!(logging["default"].file, "logs/api-worker.log");
}

#[test]
fn test_yaml_serialization() {
    let yaml = WorkerConfig::default().to_yaml().unwrap();

    assert!(yaml.contains("logging:"));
    assert!(yaml.contains("database:"));
    assert!(yaml.contains("scheduler:"));
    assert!(yaml.contains("acquire_timeout: 30s"));
}

// Tests that read `APP__` variables run inside a Jail.

#[test]
fn test_layered_loading_yaml_only() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "worker.yaml",
            r#"
logging:
  default:
    console_level: "warn"
    file: "logs/worker.log"
    file_level: "info"
    max_backups: 5
database:
  max_connections: 4
  acquire_timeout: "5s"
scheduler:
  interval: "1m"
  midnight: false
"#,
        )?;

        let config = WorkerConfig::load_layered("worker.yaml").map_err(|e| e.to_string())?;

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "warn");
        assert_eq!(logging["default"].max_backups, Some(5));
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.scheduler.interval, Duration::from_secs(60));
        assert!(!config.scheduler.midnight);
        Ok(())
    });
}

#[test]
fn test_minimal_yaml_keeps_defaults() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("cfg.yaml", "database:\n  max_connections: 2\n")?;

        let config = WorkerConfig::load_layered("cfg.yaml").map_err(|e| e.to_string())?;

        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.scheduler, SchedulerConfig::default());
        // Optional sections default to None
        assert!(config.logging.is_none());
        Ok(())
    });
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    figment::Jail::expect_with(|jail| {
        let path = jail.directory().join("absent.yaml");
        let config = WorkerConfig::load_layered(&path).map_err(|e| e.to_string())?;
        assert_eq!(config.database, DatabaseConfig::default());
        Ok(())
    });
}

#[test]
fn test_unknown_fields_are_rejected() {
    let tmp = tempdir().unwrap();
    let cfg_path = tmp.path().join("bad.yaml");
    fs::write(&cfg_path, "scheduler:\n  every: 5m\n").unwrap();

    assert!(matches!(
        WorkerConfig::load_layered(&cfg_path),
        Err(ConfigError::Extract(_))
    ));
}

#[test]
fn test_env_overrides_yaml() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "worker.yaml",
            r#"
scheduler:
  interval: "1m"
database:
  max_connections: 4
"#,
        )?;
        jail.set_env("APP__SCHEDULER__INTERVAL", "5m");
        jail.set_env("APP__DATABASE__MAX_CONNECTIONS", "25");

        let config = WorkerConfig::load_layered("worker.yaml").map_err(|e| e.to_string())?;

        assert_eq!(config.scheduler.interval, Duration::from_secs(300));
        assert_eq!(config.database.max_connections, 25);
        Ok(())
    });
}

#[test]
fn test_env_applies_without_config_file() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("APP__SCHEDULER__INTERVAL", "5m");
        jail.set_env("APP__DATABASE__ACQUIRE_TIMEOUT", "2s");

        let config = WorkerConfig::load_or_default(None::<&str>).map_err(|e| e.to_string())?;

        assert_eq!(config.scheduler.interval, Duration::from_secs(300));
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.database.max_connections, 10);
        assert!(config.logging.as_ref().is_some_and(|l| l.contains_key("default")));
        Ok(())
    });
}

#[test]
fn test_pool_settings_follow_database_section() {
    let db = DatabaseConfig {
        max_connections: 3,
        acquire_timeout: Duration::from_secs(2),
    };
    assert_eq!(
        db.pool_settings(),
        PoolSettings {
            max_connections: 3,
            acquire_timeout: Duration::from_secs(2)
        }
    );
}

#[test]
fn test_cli_overrides() {
    let mut config = WorkerConfig::default();

    let args = CliArgs {
        interval: Some(Duration::from_secs(10)),
        verbose: 2, // trace
        ..CliArgs::default()
    };

    config.apply_cli_overrides(&args);

    assert_eq!(config.scheduler.interval, Duration::from_secs(10));
    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "trace");
}

#[test]
fn test_cli_verbose_levels_matrix() {
    for (verbose_level, expected_log_level) in [
        (0, "info"), // unchanged from default
        (1, "debug"),
        (2, "trace"),
        (3, "trace"), // cap at trace
    ] {
        let mut config = WorkerConfig::default();
        let args = CliArgs {
            verbose: verbose_level,
            ..CliArgs::default()
        };

        config.apply_cli_overrides(&args);

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, expected_log_level);
    }
}

#[test]
fn test_cli_overrides_create_logging_when_absent() {
    let mut config = WorkerConfig {
        logging: None,
        ..WorkerConfig::default()
    };
    config.apply_cli_overrides(&CliArgs {
        verbose: 1,
        ..CliArgs::default()
    });
    assert_eq!(
        config.logging.as_ref().unwrap()["default"].console_level,
        "debug"
    );
}
