use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::services::PageLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct GarageConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub pagination: PaginationConfig,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl PaginationConfig {
    /// Sizes are at least one, and the maximum never drops below the default.
    pub fn limits(&self) -> PageLimits {
        let default_page_size = self.default_page_size.max(1);
        PageLimits {
            default_page_size,
            max_page_size: self.max_page_size.max(default_page_size),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        let limits = PageLimits::default();
        Self {
            default_page_size: limits.default_page_size,
            max_page_size: limits.max_page_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    pub batch_size: usize,
    /// Run the partition backfill and catalog flattening before serving.
    pub run_on_startup: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            run_on_startup: false,
        }
    }
}

impl GarageConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(GarageConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("garage_db"), is_prod)?,
            },
            pagination: PaginationConfig {
                default_page_size: parse_env("PAGINATION_DEFAULT_PAGE_SIZE", "20", is_prod)?,
                max_page_size: parse_env("PAGINATION_MAX_PAGE_SIZE", "100", is_prod)?,
            },
            migration: MigrationConfig {
                batch_size: parse_env("MIGRATION_BATCH_SIZE", "50", is_prod)?,
                run_on_startup: parse_env("MIGRATION_RUN_ON_STARTUP", "false", is_prod)?,
            },
        })
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!(format!("Invalid {}: {} ({})", key, raw, e)))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
