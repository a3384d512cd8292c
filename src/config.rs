use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "price-tracker";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram_token: Option<String>,

    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Defaults to a file under the platform data directory.
    pub store_path: Option<String>,

    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u32,

    #[serde(default)]
    pub check_on_startup: bool,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_check_delay_min")]
    pub check_delay_min_secs: u64,

    #[serde(default = "default_check_delay_max")]
    pub check_delay_max_secs: u64,

    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_check_interval() -> u32 {
    60
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_check_delay_min() -> u64 {
    5
}

fn default_check_delay_max() -> u64 {
    10
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["flipkart.com".to_string()]
}

fn default_list_limit() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: None,
            store_backend: StoreBackend::default(),
            store_path: None,
            check_interval_minutes: default_check_interval(),
            check_on_startup: false,
            fetch_timeout_secs: default_fetch_timeout(),
            check_delay_min_secs: default_check_delay_min(),
            check_delay_max_secs: default_check_delay_max(),
            allowed_hosts: default_allowed_hosts(),
            list_limit: default_list_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            if !token.trim().is_empty() {
                config.telegram_token = Some(token.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_minutes == 0 {
            return Err(AppError::Config(
                "check_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(AppError::Config(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.check_delay_min_secs > self.check_delay_max_secs {
            return Err(AppError::Config(format!(
                "check_delay_min_secs ({}) exceeds check_delay_max_secs ({})",
                self.check_delay_min_secs, self.check_delay_max_secs
            )));
        }
        if self.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(AppError::Config(
                "allowed_hosts must name at least one host".to_string(),
            ));
        }
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        if let Some(path) = &self.store_path {
            return PathBuf::from(path);
        }
        let file_name = match self.store_backend {
            StoreBackend::Json => "tracked_products.json",
            StoreBackend::Sqlite => "tracked_products.db",
        };
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(file_name)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval_minutes) * 60)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn check_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.check_delay_min_secs),
            Duration::from_secs(self.check_delay_max_secs),
        )
    }
}
