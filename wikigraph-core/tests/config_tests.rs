// Tests for settings loading

use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use wikigraph_core::config::{ConfigError, DEFAULT_WIKI_BASE_URL, Settings, expand_path};
use wikigraph_stream::DEFAULT_API_URL;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_or_default(&dir.path().join("absent.json")).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.api_url, DEFAULT_API_URL);
    assert_eq!(settings.wiki_base_url, DEFAULT_WIKI_BASE_URL);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"api_url": "http://crawler:8080", "node_cap": 300}"#);

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.api_url, "http://crawler:8080");
    assert_eq!(settings.node_cap, 300);
    assert_eq!(settings.retry_delay_ms, 2000);
}

#[test]
fn test_empty_object_is_valid() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{}");
    assert_eq!(Settings::load(&path).unwrap(), Settings::default());
}

#[test]
fn test_unknown_field_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"api_ulr": "http://typo"}"#);
    assert!(matches!(
        Settings::load_or_default(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"api_url": "not a url"}"#);
    assert!(matches!(Settings::load(&path), Err(ConfigError::Invalid(_))));

    let path = write_config(&dir, r#"{"node_cap": 5}"#);
    assert!(matches!(Settings::load(&path), Err(ConfigError::Invalid(_))));
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
fn test_flag_beats_env_beats_file() {
    let file = Settings {
        api_url: "http://from-file:5000".to_string(),
        ..Settings::default()
    };

    let env_only = file
        .clone()
        .resolve_api_url(Some("http://from-env:5000".to_string()), None)
        .unwrap();
    assert_eq!(env_only.api_url, "http://from-env:5000");

    let both = file
        .clone()
        .resolve_api_url(
            Some("http://from-env:5000".to_string()),
            Some("http://from-flag:5000"),
        )
        .unwrap();
    assert_eq!(both.api_url, "http://from-flag:5000");

    let neither = file.clone().resolve_api_url(None, None).unwrap();
    assert_eq!(neither.api_url, "http://from-file:5000");
}

// ============================================================================
// Derived Config Tests
// ============================================================================

#[test]
fn test_controller_config_zero_disables_bounds() {
    let settings = Settings {
        max_conflict_retries: 0,
        idle_timeout_secs: 0,
        retry_delay_ms: 500,
        ..Settings::default()
    };
    let config = settings.controller_config();
    assert_eq!(config.max_conflict_retries, None);
    assert_eq!(config.idle_timeout, None);
    assert_eq!(config.retry_delay, Duration::from_millis(500));

    let config = Settings::default().controller_config();
    assert_eq!(config.max_conflict_retries, Some(20));
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(60)));
}

#[test]
fn test_layout_config_and_page_url() {
    let settings = Settings {
        settle_delay_ms: 50,
        ..Settings::default()
    };
    assert_eq!(settings.layout_config().settle_delay, Duration::from_millis(50));
    assert_eq!(
        settings.page_url("Fergana_(moth)"),
        "https://en.wikipedia.org/wiki/Fergana_(moth)"
    );
}

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/.config/wikigraph/config.json");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with(".config/wikigraph/config.json"));
}
