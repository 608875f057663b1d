//! Configuration management for the inventory planner
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STOCKPLAN_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::models::PlanningConfig;
use shared::validation::validate_planning_config;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Nightly snapshot configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Order ledger configuration
    pub ledger: LedgerConfig,

    /// Catalog lookups configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Planning policy (safety days, target days, pack rules, ...)
    #[serde(default)]
    pub planning: PlanningConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SnapshotConfig {
    /// Snapshot analyzed at startup when present
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Directory holding one CSV file per worksheet
    pub dir: String,

    /// Timeout applied to every ledger read or write
    pub io_timeout_ms: u64,
}

impl LedgerConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// JSON file with store, brand, supplier and product lookups
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKPLAN_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("ledger.dir", "data/ledger")?
            .set_default("ledger.io_timeout_ms", 10_000)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKPLAN_SERVER__PORT, ...)
            .add_source(
                Environment::with_prefix("STOCKPLAN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject planning options that would make the engine meaningless
    pub fn validate(&self) -> AppResult<()> {
        self.planning
            .validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        validate_planning_config(&self.planning)
            .map_err(|msg| AppError::Configuration(msg.to_string()))?;
        if self.ledger.io_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "ledger.io_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
