/*
[INPUT]:  YAML configuration file, TRADEVIEW_* environment variables
[OUTPUT]: Parsed monitor configuration
[POS]:    Configuration layer - monitor setup
[UPDATE]: When adding new configuration options
*/

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tradeview_adapter::ws::DEFAULT_WS_BASE_URL;
use tradeview_adapter::{
    ChannelConfig, ClientConfig, DEFAULT_BASE_URL, Interval, ReconnectPolicy, SeriesViewOptions,
};

pub const USERNAME_ENV: &str = "TRADEVIEW_USERNAME";
pub const PASSWORD_ENV: &str = "TRADEVIEW_PASSWORD";

/// Top-level configuration for the monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    /// Login credentials; env vars take precedence
    #[serde(default)]
    pub account: Option<AccountConfig>,
    /// Directory holding the persisted session tokens
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    /// Symbols followed on the price channel
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Market ids followed on the order book channel
    #[serde(default)]
    pub order_books: Vec<String>,
    #[serde(default)]
    pub chart: Option<ChartConfig>,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
}

/// Server endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    /// Anonymous credential for public endpoints
    #[serde(default)]
    pub public_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_base_url: default_ws_base_url(),
            public_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
}

/// One candle chart kept live with backfill
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartConfig {
    pub symbol: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Older pages fetched right after the initial load
    #[serde(default)]
    pub backfill_pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl ChartConfig {
    pub fn interval(&self) -> anyhow::Result<Interval> {
        Interval::from_str(&self.interval)
            .with_context(|| format!("chart interval {:?}", self.interval))
    }

    pub fn view_options(&self) -> SeriesViewOptions {
        SeriesViewOptions {
            page_size: self.page_size,
            ..SeriesViewOptions::default()
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ws_base_url() -> String {
    DEFAULT_WS_BASE_URL.to_string()
}

fn default_interval() -> String {
    Interval::OneMinute.as_str().to_string()
}

fn default_page_size() -> u32 {
    tradeview_adapter::series::DEFAULT_PAGE_SIZE
}

fn default_report_interval_secs() -> u64 {
    10
}

fn default_depth_levels() -> usize {
    tradeview_adapter::store::DEFAULT_DEPTH_LEVELS
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.report_interval_secs == 0 {
            bail!("report_interval_secs must be positive");
        }
        if self.depth_levels == 0 {
            bail!("depth_levels must be positive");
        }
        if let Some(chart) = &self.chart {
            if chart.symbol.trim().is_empty() {
                bail!("chart symbol is empty");
            }
            chart.interval()?;
        }
        if self.symbols.is_empty() && self.order_books.is_empty() && self.chart.is_none() {
            bail!("nothing to monitor: set symbols, order_books or chart");
        }
        Ok(())
    }

    /// Username and password, environment first
    pub fn credentials(&self) -> Option<(String, String)> {
        let from_env = std::env::var(USERNAME_ENV)
            .ok()
            .zip(std::env::var(PASSWORD_ENV).ok());
        from_env.or_else(|| {
            self.account
                .as_ref()
                .map(|account| (account.username.clone(), account.password.clone()))
        })
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tradeview")
                .join("session")
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            public_key: self.api.public_key.clone(),
            ..ClientConfig::with_base_url(self.api.base_url.clone())
        }
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            reconnect: self.reconnect.clone(),
            ..ChannelConfig::with_base_url(self.api.ws_base_url.clone())
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}
