use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{DashboardError, Result};
use crate::processor::DedupPolicy;

/// Dashboard configuration loaded from YAML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub use_tls: bool,
    /// Accept self-signed certificates (managed Postgres behind TLS)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            use_tls: false,
            accept_invalid_certs: false,
        }
    }
}

/// Forecasting API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token, normally supplied through THAINK2_API_TOKEN
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_forecast_path")]
    pub forecast_path: String,
    /// Request timeout (ms)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_forecast_path() -> String { "/forecast".to_string() }
fn default_timeout_ms() -> u64 { 120_000 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: String::new(),
            forecast_path: default_forecast_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Historical points shown before the forecast in charts
    #[serde(default = "default_zoom_points")]
    pub zoom_history_points: usize,
    /// Overlap handling between backtest and forecast segments
    #[serde(default)]
    pub dedup: DedupPolicy,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_zoom_points() -> usize { 20 }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            zoom_history_points: default_zoom_points(),
            dedup: DedupPolicy::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| DashboardError::Config(format!("Failed to parse YAML configuration: {}", e)))
    }

    /// Load the YAML file if it exists, then apply environment overrides
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DB_HOST") {
            self.database.host = val;
        }
        if let Some(val) = lookup("DB_NAME") {
            self.database.database = val;
        }
        if let Some(val) = lookup("DB_USER") {
            self.database.user = val;
        }
        if let Some(val) = lookup("DB_PASSWORD") {
            self.database.password = val;
        }
        if let Some(val) = lookup("DB_PORT") {
            self.database.port = val
                .parse()
                .map_err(|_| DashboardError::Config(format!("DB_PORT is not a port number: {}", val)))?;
        }
        if let Some(val) = lookup("DB_TLS") {
            self.database.use_tls = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(val) = lookup("API_URL") {
            self.api.base_url = val;
        }
        if let Some(val) = lookup("THAINK2_API_TOKEN") {
            self.api.token = val;
        }
        if let Some(val) = lookup("API_FORECAST_PATH") {
            self.api.forecast_path = val;
        }
        if let Some(val) = lookup("API_TIMEOUT_MS") {
            self.api.timeout_ms = val
                .parse()
                .map_err(|_| DashboardError::Config(format!("API_TIMEOUT_MS is not a number of milliseconds: {}", val)))?;
        }
        if let Some(val) = lookup("OUTPUT_DIR") {
            self.dashboard.output_dir = PathBuf::from(val);
        }
        Ok(())
    }
}
