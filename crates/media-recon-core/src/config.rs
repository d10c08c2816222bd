use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub radarr: ServiceConfig,
    pub sonarr: ServiceConfig,
    pub http: HttpConfig,
    pub history: HistoryConfig,
    pub remediation: RemediationConfig,
    pub scan: ScanConfig,
}

/// Connection details for one library manager.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first failure.
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retry_count: 2,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub page_size: u32,
    /// Pages read past the natural stop point in paged mode.
    pub overscan_pages: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            overscan_pages: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl RemediationConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Lines between progress callbacks while streaming a file list.
    pub progress_every: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            progress_every: 50_000,
        }
    }
}

/// Load `Config.{toml,yaml,json}` from the working directory (optional), then
/// overlay `MEDIA_RECON__SECTION__KEY` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("MEDIA_RECON")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
