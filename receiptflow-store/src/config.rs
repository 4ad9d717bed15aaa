//! Configuration management.
//!
//! Configuration lives in a JSON file; every field has a default, so a
//! missing file or a partial one is fine. Two environment variables override
//! the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `RECEIPTFLOW_FISCAL_TOKENS` | `fiscal.tokens` (comma-separated) |
//! | `RECEIPTFLOW_ENRICHMENT_URL` | `enrichment.base_url` |

use receiptflow_core::{DEFAULT_ERROR_MESSAGE_LIMIT, mask_credential};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::default_config_path;

/// Environment variable holding comma-separated fiscal tokens.
pub const ENV_FISCAL_TOKENS: &str = "RECEIPTFLOW_FISCAL_TOKENS";

/// Environment variable holding the enrichment base URL.
pub const ENV_ENRICHMENT_URL: &str = "RECEIPTFLOW_ENRICHMENT_URL";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Fiscal authority lookup.
    #[serde(default)]
    pub fiscal: FiscalConfig,
    /// Enrichment service.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Fiscal authority settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalConfig {
    /// Base URL of the fiscal API.
    #[serde(default = "default_fiscal_base_url")]
    pub base_url: String,
    /// Access tokens, rotated round-robin.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Seconds between timer-driven rotations.
    #[serde(default = "default_rotation_interval")]
    pub rotation_interval_secs: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_fiscal_timeout")]
    pub timeout_secs: u64,
    /// Upper bound on attempts per lookup.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Consecutive errors that disable a token.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Seconds a disabled token stays out of rotation.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

/// Enrichment service settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Base URL of the enrichment service.
    #[serde(default = "default_enrichment_base_url")]
    pub base_url: String,
    /// Optional bearer credential.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Timeout of the one-shot call in seconds. Streamed calls only bound
    /// the connect phase.
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Longest error message stored on a receipt, in characters.
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
    /// Capacity of streamed event channels.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_fiscal_base_url() -> String {
    "https://proverkacheka.com".to_string()
}

fn default_rotation_interval() -> u64 {
    60
}

fn default_fiscal_timeout() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

fn default_error_threshold() -> u32 {
    3
}

fn default_cooldown() -> u64 {
    300
}

fn default_enrichment_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_enrichment_timeout() -> u64 {
    120
}

fn default_error_message_limit() -> usize {
    DEFAULT_ERROR_MESSAGE_LIMIT
}

fn default_stream_buffer() -> usize {
    32
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            base_url: default_fiscal_base_url(),
            tokens: Vec::new(),
            rotation_interval_secs: default_rotation_interval(),
            timeout_secs: default_fiscal_timeout(),
            max_attempts: default_max_attempts(),
            error_threshold: default_error_threshold(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrichment_base_url(),
            api_key: None,
            timeout_secs: default_enrichment_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            error_message_limit: default_error_message_limit(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl fmt::Debug for FiscalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked: Vec<String> = self.tokens.iter().map(|t| mask_credential(t)).collect();
        f.debug_struct("FiscalConfig")
            .field("base_url", &self.base_url)
            .field("tokens", &masked)
            .field("rotation_interval_secs", &self.rotation_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("error_threshold", &self.error_threshold)
            .field("cooldown_secs", &self.cooldown_secs)
            .finish()
    }
}

impl fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask_credential))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FiscalConfig {
    /// Returns the rotation period.
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the token cooldown.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl EnrichmentConfig {
    /// Returns the one-shot timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path, owner-readable only on Unix.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_FISCAL_TOKENS).ok().as_deref(),
            std::env::var(ENV_ENRICHMENT_URL).ok().as_deref(),
        )
    }

    /// Applies explicit overrides. Blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, tokens: Option<&str>, enrichment_url: Option<&str>) -> Self {
        if let Some(tokens) = tokens.filter(|t| !t.trim().is_empty()) {
            self.fiscal.tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            debug!(count = self.fiscal.tokens.len(), "Fiscal tokens taken from environment");
        }
        if let Some(url) = enrichment_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.enrichment.base_url = url.to_string();
        }
        self
    }

    /// Checks the settings the pipeline cannot run without.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.fiscal.tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(StoreError::Config(format!(
                "no fiscal tokens configured (set fiscal.tokens or {ENV_FISCAL_TOKENS})"
            )));
        }
        if self.fiscal.rotation_interval_secs == 0 {
            return Err(StoreError::Config(
                "fiscal.rotation_interval_secs must be positive".to_string(),
            ));
        }
        if self.pipeline.stream_buffer == 0 {
            return Err(StoreError::Config(
                "pipeline.stream_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a copy safe to display, with credentials masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.fiscal.tokens = copy.fiscal.tokens.iter().map(|t| mask_credential(t)).collect();
        copy.enrichment.api_key = copy.enrichment.api_key.as_deref().map(mask_credential);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        Config::default().with_overrides(Some("31337.aaaaaaaa, 31337.bbbbbbbb ,"), None)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fiscal.rotation_interval(), Duration::from_secs(60));
        assert_eq!(config.fiscal.timeout(), Duration::from_secs(30));
        assert_eq!(config.fiscal.max_attempts, 3);
        assert_eq!(config.fiscal.error_threshold, 3);
        assert_eq!(config.fiscal.cooldown(), Duration::from_secs(300));
        assert_eq!(config.enrichment.timeout(), Duration::from_secs(120));
        assert_eq!(config.pipeline.stream_buffer, 32);
    }

    #[test]
    fn test_overrides() {
        let config = configured().with_overrides(None, Some(" http://enrich:9000 "));
        assert_eq!(config.fiscal.tokens, vec!["31337.aaaaaaaa", "31337.bbbbbbbb"]);
        assert_eq!(config.enrichment.base_url, "http://enrich:9000");

        let untouched = config.clone().with_overrides(Some("  "), Some(""));
        assert_eq!(untouched, config);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(Config::default().validate(), Err(StoreError::Config(_))));
        assert!(configured().validate().is_ok());

        let mut config = configured();
        config.fiscal.rotation_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.pipeline.stream_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_never_displayed() {
        let mut config = configured();
        config.enrichment.api_key = Some("sk-enrichment-secret".to_string());

        let debug = format!("{config:?}");
        assert!(!debug.contains("aaaaaaaa"));
        assert!(!debug.contains("secret"));

        let redacted = config.redacted();
        assert_eq!(redacted.fiscal.tokens[0], "3133...aaaa");
        assert_eq!(redacted.enrichment.api_key.as_deref(), Some("sk-e...cret"));
    }
}
