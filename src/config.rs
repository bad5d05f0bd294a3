// src/config.rs

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub secret_key: String,
    pub poll_interval_secs: u64,
    pub quote_asset: String,
    pub dust_threshold: Decimal,
}

impl AppConfig {
    /// Defaults, overridden by an optional `Settings` file, overridden by
    /// `APP_`-prefixed environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("api_key", "")?
            .set_default("secret_key", "")?
            .set_default("poll_interval_secs", 5)?
            .set_default("quote_asset", "USDT")?
            .set_default("dust_threshold", "5")?
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::with_prefix("APP"));

        let config = builder.build()?;
        config.try_deserialize()
    }
}
