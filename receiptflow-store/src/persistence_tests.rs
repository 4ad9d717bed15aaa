//! Tests for JSON persistence and configuration loading.

use super::config::Config;
use super::persistence::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    name: String,
    total: i64,
}

fn sample() -> Sample {
    Sample {
        name: "Pizzeria".to_string(),
        total: 150_000,
    }
}

#[tokio::test]
async fn test_save_and_load_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sample.json");

    save_json(&path, &sample()).await.unwrap();
    let loaded: Sample = load_json(&path).await.unwrap();

    assert_eq!(loaded, sample());
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a").join("b").join("sample.json");

    save_json(&path, &sample()).await.unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn test_atomic_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sample.json");

    save_json(&path, &sample()).await.unwrap();

    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.json");

    let err = load_json::<Sample>(&path).await.unwrap_err();
    assert!(err.is_missing_file());

    let none: Option<Sample> = load_json_if_exists(&path).await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_load_corrupt_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("corrupt.json");
    tokio::fs::write(&path, "{not json").await.unwrap();

    let err = load_json_if_exists::<Sample>(&path).await.unwrap_err();
    assert!(!err.is_missing_file());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("data");

    ensure_dir(&dir).await.unwrap();
    ensure_dir(&dir).await.unwrap();

    assert!(dir.is_dir());
}

// ============================================================================
// Config files
// ============================================================================

#[test]
fn test_config_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_from(&temp_dir.path().join("config.json")).unwrap();

    assert_eq!(config.fiscal.base_url, "https://proverkacheka.com");
    assert!(config.fiscal.tokens.is_empty());
}

#[test]
fn test_config_minimal_json_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{"fiscal": {"tokens": ["31337.abcdefgh"]}}"#).unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.fiscal.tokens, vec!["31337.abcdefgh".to_string()]);
    assert_eq!(config.fiscal.rotation_interval_secs, 60);
    assert_eq!(config.enrichment.timeout_secs, 120);
    assert_eq!(config.pipeline.error_message_limit, 2000);
}

#[test]
fn test_config_unknown_fields_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{"future": true, "pipeline": {"stream_buffer": 8, "x": 1}}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.pipeline.stream_buffer, 8);
}

#[test]
fn test_config_save_and_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.fiscal.tokens = vec!["token-one-123456".to_string()];
    config.enrichment.api_key = Some("sk-enrich-abcdef".to_string());
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.fiscal.tokens, config.fiscal.tokens);
    assert_eq!(loaded.enrichment.api_key, config.enrichment.api_key);
}

#[test]
fn test_config_invalid_json_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, "fiscal = 1").unwrap();

    assert!(Config::load_from(&path).is_err());
}
