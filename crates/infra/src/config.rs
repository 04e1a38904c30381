//! Engine configuration.
//!
//! Layered in increasing precedence:
//! 1. built-in defaults
//! 2. `config/default.{toml,json,yaml}` (optional)
//! 3. `config/{RUN_ENV}.{toml,json,yaml}` (optional)
//! 4. environment variables, e.g. `INSIGHT__INVENTORY__LEAD_TIME_DAYS=5`

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use insight_ai::anomaly::AnomalyConfig;
use insight_ai::forecast::ForecastParams;
use insight_ai::inventory::InventoryPolicy;
use insight_ai::scoring::{SalespersonWeights, SupplierWeights};
use insight_core::ModelVersion;

pub const CONFIG_DIR: &str = "config";
pub const ENV_PREFIX: &str = "INSIGHT";
const DEFAULT_RUN_ENV: &str = "development";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub horizon_days: u32,
    pub min_points: usize,
    pub weekly_seasonality: bool,
    /// Directory for cached model artifacts; models stay in memory when unset.
    pub model_dir: Option<PathBuf>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        let params = ForecastParams::default();
        Self {
            horizon_days: 30,
            min_points: params.min_points,
            weekly_seasonality: params.weekly_seasonality,
            model_dir: None,
        }
    }
}

impl ForecastSettings {
    pub fn params(&self) -> ForecastParams {
        ForecastParams {
            min_points: self.min_points,
            weekly_seasonality: self.weekly_seasonality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    pub days_window: u32,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self { days_window: 365 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub supplier: SupplierWeights,
    pub salesperson: SalespersonWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model_version: ModelVersion,
    pub forecast: ForecastSettings,
    pub inventory: InventoryPolicy,
    pub anomaly: AnomalyConfig,
    pub segmentation: SegmentationSettings,
    pub scoring: ScoringSettings,
    pub server: ServerSettings,
    /// JSON ledger snapshot loaded at startup.
    pub ledger_path: Option<PathBuf>,
    /// Default tracing directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_version: ModelVersion::default(),
            forecast: ForecastSettings::default(),
            inventory: InventoryPolicy::default(),
            anomaly: AnomalyConfig::default(),
            segmentation: SegmentationSettings::default(),
            scoring: ScoringSettings::default(),
            server: ServerSettings::default(),
            ledger_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from `./config` using `RUN_ENV` (or `APP_ENV`) to pick the
    /// environment file.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| DEFAULT_RUN_ENV.to_string());
        Self::load_from(Path::new(CONFIG_DIR), &run_env)
    }

    pub fn load_from(dir: &Path, run_env: &str) -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();
        let default_file = dir.join("default");
        let env_file = dir.join(run_env);

        let raw = Config::builder()
            .set_default("model_version", defaults.model_version.as_str())?
            .set_default("server.bind_addr", defaults.server.bind_addr.as_str())?
            .set_default("log_filter", defaults.log_filter.as_str())?
            .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = raw.try_deserialize()?;
        config.validate()?;

        info!(
            run_env,
            model_version = %config.model_version,
            bind_addr = %config.server.bind_addr,
            model_dir = ?config.forecast.model_dir,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ModelVersion::new(self.model_version.as_str()).map_err(invalid)?;

        if self.forecast.horizon_days == 0 {
            return Err(ConfigError::Invalid("forecast.horizon_days must be positive".into()));
        }
        if self.forecast.min_points == 0 {
            return Err(ConfigError::Invalid("forecast.min_points must be positive".into()));
        }
        self.inventory.validate().map_err(invalid)?;

        let a = &self.anomaly;
        if !a.z_threshold.is_finite() || a.z_threshold <= 0.0 {
            return Err(ConfigError::Invalid("anomaly.z_threshold must be positive".into()));
        }
        if !a.alert_severity.is_finite() || a.alert_severity < 0.0 {
            return Err(ConfigError::Invalid("anomaly.alert_severity must be >= 0".into()));
        }
        if a.trees == 0 || a.max_samples < 2 {
            return Err(ConfigError::Invalid(
                "anomaly.trees must be positive and anomaly.max_samples at least 2".into(),
            ));
        }

        if self.segmentation.days_window == 0 {
            return Err(ConfigError::Invalid("segmentation.days_window must be positive".into()));
        }
        self.scoring.supplier.validate().map_err(invalid)?;
        self.scoring.salesperson.validate().map_err(invalid)?;

        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.bind_addr: {e}")))
    }
}

fn invalid(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid(e.to_string())
}
