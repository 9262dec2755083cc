use crate::error::ConfigError;
use serde_derive::Deserialize;
use std::str::FromStr;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn log_level(&self) -> tracing::Level {
        tracing::Level::from_str(self.log_level.as_str()).unwrap_or(tracing::Level::INFO)
    }
}

pub(crate) fn load_app_config() -> Result<AppConfig, ConfigError> {
    envy::from_env::<AppConfig>().map_err(|e| ConfigError::env_parse(e))
}

fn default_base_url() -> String {
    "https://www.mel-ileo.fr".to_string()
}

#[derive(Deserialize, Debug)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub email: String,
    pub password: String,
}

pub(crate) fn load_portal_config() -> Result<PortalConfig, ConfigError> {
    envy::prefixed("ILEO_")
        .from_env::<PortalConfig>()
        .map_err(|e| ConfigError::env_parse(e))
}

fn default_interval_sec() -> u64 {
    // the portal publishes at most one reading per day; twice daily is plenty
    12 * 60 * 60
}

fn default_window_days() -> i64 {
    180
}

fn default_task_timeout_seconds() -> u64 {
    300
}

#[derive(Deserialize, Debug)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u64,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,
}

pub fn load_refresh_config() -> Result<RefreshConfig, ConfigError> {
    let config = envy::prefixed("REFRESH_")
        .from_env::<RefreshConfig>()
        .map_err(|e| ConfigError::env_parse(e))?;
    if config.window_days <= 0 {
        return Err(ConfigError::invalid(
            "REFRESH_WINDOW_DAYS",
            "must be a positive number of days",
        ));
    }
    Ok(config)
}

#[derive(Deserialize, Debug)]
pub struct SensorConfig {
    // seed the whole index history into statistics on the first-ever run,
    // instead of only the most recent reading
    #[serde(default)]
    pub import_full_history: bool,
    // hold back the live index value while its history backfills
    #[serde(default)]
    pub defer_index_display: bool,
}

pub fn load_sensor_config() -> Result<SensorConfig, ConfigError> {
    envy::prefixed("SENSOR_")
        .from_env::<SensorConfig>()
        .map_err(|e| ConfigError::env_parse(e))
}

#[derive(Deserialize, Debug)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

pub fn load_influx_config() -> Result<InfluxConfig, ConfigError> {
    envy::prefixed("INFLUXDB_")
        .from_env::<InfluxConfig>()
        .map_err(|e| ConfigError::env_parse(e))
}
