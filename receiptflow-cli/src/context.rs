//! Wiring from configuration to a ready pipeline.

use anyhow::{Context, Result};
use receiptflow_fetch::{RotationHandle, TokenManager, TokenSettings};
use receiptflow_pipeline::{PipelineSettings, ReceiptPipeline};
use receiptflow_providers::enrichment::EnrichmentClient;
use receiptflow_providers::fiscal::{FiscalHttpApi, FiscalLookupClient};
use receiptflow_store::{Config, MemoryReceiptRepository, default_db_path};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Cli;

/// Loads the configuration named on the command line, or the default one,
/// with environment overrides applied.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let path = config_path(cli);
    let config = Config::load_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok(config.with_env())
}

/// Returns the configuration path in effect.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

/// Returns the receipt snapshot path in effect.
pub fn db_path(cli: &Cli) -> PathBuf {
    cli.db.clone().unwrap_or_else(default_db_path)
}

/// Builds the credential pool described by the configuration.
pub fn build_tokens(config: &Config) -> Result<Arc<TokenManager>> {
    let settings = TokenSettings {
        error_threshold: config.fiscal.error_threshold,
        cooldown: config.fiscal.cooldown(),
    };
    let tokens = TokenManager::with_settings(config.fiscal.tokens.clone(), settings)?;
    Ok(Arc::new(tokens))
}

/// Everything a processing command needs.
pub struct AppContext {
    pub pipeline: ReceiptPipeline,
    rotation: RotationHandle,
}

impl AppContext {
    /// Loads configuration, opens the snapshot and starts token rotation.
    pub async fn build(cli: &Cli) -> Result<Self> {
        let config = load_config(cli)?;
        config.validate()?;

        let tokens = build_tokens(&config)?;
        let rotation = tokens.spawn_rotation(config.fiscal.rotation_interval());

        let api = FiscalHttpApi::new(&config.fiscal.base_url, config.fiscal.timeout())?;
        let fiscal = FiscalLookupClient::new(Arc::new(api), tokens)
            .with_max_attempts(config.fiscal.max_attempts);

        let enricher = EnrichmentClient::new(
            &config.enrichment.base_url,
            config.enrichment.api_key.clone(),
            config.enrichment.timeout(),
        )?
        .with_stream_buffer(config.pipeline.stream_buffer);

        let db = db_path(cli);
        let repo = Arc::new(
            MemoryReceiptRepository::open(db.clone())
                .await
                .with_context(|| format!("failed to open receipt database {}", db.display()))?,
        );

        let pipeline = ReceiptPipeline::new(repo, Arc::new(fiscal), Arc::new(enricher))
            .with_settings(PipelineSettings {
                error_message_limit: config.pipeline.error_message_limit,
                stream_buffer: config.pipeline.stream_buffer,
            });

        debug!(db = %db.display(), enrichment = %config.enrichment.base_url, "Pipeline ready");
        Ok(Self { pipeline, rotation })
    }

    /// Stops background tasks.
    pub async fn shutdown(self) {
        self.rotation.shutdown().await;
    }
}

/// Returns a token cancelled on Ctrl+C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            child.cancel();
        }
    });
    token
}
