//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `BANK__<SECTION>__<KEY>`
//! environment variables.
//!
//! See `settings.toml` for the configuration.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use engine::{EngineSettings, LockBackend};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
    /// Any connection string understood by sea-orm.
    Url(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Database,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: None,
            port: default_port(),
            database: Database::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

/// Engine parameters. Missing keys fall back to [`EngineSettings::default`].
#[derive(Debug, Default, Deserialize)]
pub struct Engine {
    pub lock_ttl_secs: Option<u64>,
    pub cap_multiplier: Option<Decimal>,
    pub accrual_rate: Option<Decimal>,
    pub accrual_interval_secs: Option<u64>,
    pub lock_backend: Option<LockBackend>,
}

impl Engine {
    pub fn to_engine_settings(&self) -> EngineSettings {
        let defaults = EngineSettings::default();
        EngineSettings {
            lock_ttl: self
                .lock_ttl_secs
                .map_or(defaults.lock_ttl, Duration::from_secs),
            cap_multiplier: self.cap_multiplier.unwrap_or(defaults.cap_multiplier),
            accrual_rate: self.accrual_rate.unwrap_or(defaults.accrual_rate),
            accrual_interval: self
                .accrual_interval_secs
                .map_or(defaults.accrual_interval, Duration::from_secs),
            lock_backend: self.lock_backend.unwrap_or(defaults.lock_backend),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub engine: Engine,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("BANK").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
