use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::api::RetryConfig;

/// Main configuration structure for Screenflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenflowConfig {
    /// Screening backend endpoints and credential
    pub api: ApiConfig,
    /// Bounded-backoff retry for persistence and registration calls
    pub retry: RetrySettings,
    /// Advisory presence channel settings
    pub presence: PresenceSettings,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the screening backend
    pub base_url: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// First backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresenceSettings {
    /// Disable to run without the advisory overlay; the workflow is
    /// unaffected
    pub enabled: bool,
    /// Broadcast channel capacity before lagging receivers drop updates
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for ScreenflowConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                token: None, // Will be read from env var
                request_timeout_seconds: 30,
            },
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 30_000,
            },
            presence: PresenceSettings {
                enabled: true,
                channel_capacity: 64,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl ScreenflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (screenflow.toml)
    /// 3. Environment variables (prefixed with SCREENFLOW_)
    pub fn load() -> Result<Self> {
        // Start from default values so file and env only need overrides
        let mut builder = Config::builder().add_source(Config::try_from(&ScreenflowConfig::default())?);

        if Path::new("screenflow.toml").exists() {
            builder = builder.add_source(File::with_name("screenflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCREENFLOW")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let mut screenflow_config: ScreenflowConfig = config.try_deserialize()?;

        // Token fallback chain - check multiple sources
        if screenflow_config.api.token.is_none() {
            if let Ok(token) = std::env::var("SCREENING_API_TOKEN") {
                screenflow_config.api.token = Some(token);
            } else if let Ok(token) = std::env::var("SCREENFLOW_API_TOKEN") {
                screenflow_config.api.token = Some(token);
            }
        }

        Ok(screenflow_config)
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

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_seconds)
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ScreenflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = ScreenflowConfig::load_env_file();
        ScreenflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ScreenflowConfig> {
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
