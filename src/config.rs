use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::pipeline::poller::PollPolicy;

/// Main configuration structure for chainscribe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainscribeConfig {
    /// Remote job-service settings
    pub api: ApiConfig,
    /// Pipeline polling cadence
    pub pipeline: PipelineSettings,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the job service stage
    pub base_url: String,
    /// Static API key sent as the x-api-key header (can be set via env var)
    pub api_key: Option<String>,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Delay between confirmation polls in milliseconds
    pub poll_interval_ms: u64,
    /// Delay between unsigned-transaction retrieval polls in milliseconds
    pub retrieve_interval_ms: u64,
    /// Maximum in-progress replies before a poll gives up; unset polls until
    /// a terminal reply
    pub max_poll_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for ChainscribeConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:3000".to_string(),
                api_key: None, // Read from env var or chainscribe.toml
                rate_limit: RateLimitConfig {
                    requests_per_second: 2,
                    burst_capacity: 10,
                },
            },
            pipeline: PipelineSettings {
                poll_interval_ms: 9_000,
                retrieve_interval_ms: 5_000,
                max_poll_attempts: Some(100),
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl From<&PipelineSettings> for PollPolicy {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            confirm_interval: Duration::from_millis(settings.poll_interval_ms),
            retrieve_interval: Duration::from_millis(settings.retrieve_interval_ms),
            max_attempts: settings.max_poll_attempts,
        }
    }
}

impl ChainscribeConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (chainscribe.toml, .chainscribe-rc)
    /// 3. Environment variables (prefixed with CHAINSCRIBE_)
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder().add_source(Config::try_from(&defaults)?);

        if Path::new("chainscribe.toml").exists() {
            builder = builder.add_source(File::with_name("chainscribe"));
        }

        if Path::new(".chainscribe-rc").exists() {
            builder = builder.add_source(File::with_name(".chainscribe-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("CHAINSCRIBE")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut chainscribe_config: ChainscribeConfig = config.try_deserialize()?;

        // Special handling for the API key - check multiple sources
        if chainscribe_config.api.api_key.is_none() {
            if let Ok(key) = std::env::var("CHAINSCRIBE_API_KEY") {
                chainscribe_config.api.api_key = Some(key);
            } else if let Ok(key) = std::env::var("API_KEY") {
                chainscribe_config.api.api_key = Some(key);
            }
        }

        Ok(chainscribe_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ChainscribeConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = ChainscribeConfig::load_env_file();
        ChainscribeConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ChainscribeConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
