use std::fs;

use taskscope::core::config::{EngineConfig, GpuConfig, ProcessConfig};
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = EngineConfig::default();
    assert_eq!(config.process.tick_interval_ms, 1000);
    assert_eq!(config.gpu.ema_alpha, 0.4);
    assert_eq!(config.gpu.zero_streak_threshold, 5);
    assert_eq!(config.gpu.max_aggregated_instances, 12);
    assert_eq!(config.gpu.max_per_process_instances, 64);
}

#[test]
fn test_config_load_missing_file_returns_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.json");

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = EngineConfig {
        process: ProcessConfig {
            tick_interval_ms: 500,
            resolve_icons: false,
            ..Default::default()
        },
        gpu: GpuConfig {
            ema_alpha: 0.25,
            enable_secondary_provider: false,
            ..Default::default()
        },
    };
    config.save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_garbage_falls_back_to_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_out_of_range_values_are_clamped_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"process": {"tick_interval_ms": 0}, "gpu": {"ema_alpha": 7.5, "zero_streak_threshold": 0}}"#,
    )
    .unwrap();

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config.process.tick_interval_ms, 1);
    assert_eq!(config.gpu.ema_alpha, 1.0);
    assert_eq!(config.gpu.zero_streak_threshold, 1);
    assert!(config.process.resolve_usernames);
}
