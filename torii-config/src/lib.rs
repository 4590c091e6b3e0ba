//! Layered configuration loading utilities.

use std::path::Path;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root application configuration deserialized from layered sources.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_legal_currency_code")]
    pub legal_currency_code: String,
    #[serde(default = "default_crypto_currency_code")]
    pub crypto_currency_code: String,
    #[serde(default = "default_data_store_size")]
    pub data_store_size: usize,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub health: HealthServerConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Endpoints and credentials for the exchange connector.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            ws_url: default_ws_url(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

/// Embedded liveness endpoint settings.
#[derive(Debug, Deserialize, Clone)]
pub struct HealthServerConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    #[serde(default = "default_health_addr")]
    pub addr: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            addr: default_health_addr(),
        }
    }
}

/// LINE Messaging API settings for the report notifier.
#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub channel_token: String,
    #[serde(default)]
    pub destination_user_id: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_notifier_base_url(),
            channel_token: String::new(),
            destination_user_id: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_legal_currency_code() -> String {
    "JPY".to_string()
}

fn default_crypto_currency_code() -> String {
    "FX_BTC_JPY".to_string()
}

fn default_data_store_size() -> usize {
    120
}

fn default_rest_url() -> String {
    "https://api.bitflyer.com".to_string()
}

fn default_ws_url() -> String {
    "wss://ws.lightstream.bitflyer.com/json-rpc".to_string()
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_notifier_base_url() -> String {
    "https://api.line.me".to_string()
}

/// Loads configuration by merging files and environment variables.
///
/// Sources (lowest to highest precedence):
/// 1. `config/default.toml` (optional)
/// 2. `config/{environment}.toml` (if `environment` is Some)
/// 3. `config/local.toml` (optional, ignored in git)
/// 4. Environment variables prefixed with `TORII_`
pub fn load_config(env: Option<&str>) -> Result<AppConfig> {
    let base_path = Path::new("config");

    let mut builder =
        Config::builder().add_source(File::from(base_path.join("default.toml")).required(false));
    if let Some(env_name) = env {
        builder = builder
            .add_source(File::from(base_path.join(format!("{env_name}.toml"))).required(false));
    }
    builder = builder.add_source(File::from(base_path.join("local.toml")).required(false));
    builder = builder.add_source(
        Environment::with_prefix("TORII")
            .separator("__")
            .ignore_empty(true),
    );

    let config = builder.build()?;
    config
        .try_deserialize()
        .map_err(|err: ConfigError| err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_field() {
        let cfg: AppConfig = serde_json::from_str("{}").expect("empty config deserializes");
        assert_eq!(cfg.legal_currency_code, "JPY");
        assert_eq!(cfg.crypto_currency_code, "FX_BTC_JPY");
        assert_eq!(cfg.data_store_size, 120);
        assert_eq!(cfg.exchange.rest_url, "https://api.bitflyer.com");
        assert!(cfg.health.enabled);
        assert_eq!(cfg.health.addr, "0.0.0.0:8080");
        assert_eq!(cfg.notifier.base_url, "https://api.line.me");
    }
}
