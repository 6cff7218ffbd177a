use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_slot_count")]
    pub default_slot_count: usize,
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
}

impl SimulatorConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_secs(self.hold_seconds)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            default_slot_count: default_slot_count(),
            hold_seconds: default_hold_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub url: Option<String>,
    pub user_id: Option<String>,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    #[serde(default)]
    pub policy: ReconnectStrategy,
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            url: None,
            user_id: None,
            reconnect_delay_seconds: default_reconnect_delay(),
            policy: ReconnectStrategy::default(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

fn default_slot_count() -> usize { 10 }
fn default_hold_seconds() -> u64 { 3600 }
fn default_reconnect_delay() -> u64 { 5 }
fn default_max_delay() -> u64 { 60 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment specific overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `PARKMATE_SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("PARKMATE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
