use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use rusty_money::iso::{self, Currency};
use serde::Deserialize;

use crate::swipe::{SwipeConfig, DEFAULT_THRESHOLD};
use crate::CLIENT_NAME;

const CONFIG_NAME: &str = "config.toml";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub db_file: String,
    /// ISO 4217 code amounts are parsed and shown in.
    pub currency: String,
    pub review: Review,
}

#[derive(Debug, Deserialize)]
pub struct Review {
    /// Width of the review surface, in terminal columns.
    pub viewport_width: f64,
    pub threshold: f64,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut s = Config::builder()
            .set_default("db_file", default_data_path())?
            .set_default("currency", "USD")?
            .set_default("review.viewport_width", 80.0)?
            .set_default("review.threshold", DEFAULT_THRESHOLD)?;

        // An explicit path must exist, the default one may not yet.
        s = match config_path {
            Some(path) => s.add_source(File::with_name(path)),
            None => s.add_source(File::with_name(&default_config_path()).required(false)),
        };

        s.add_source(Environment::with_prefix("TALLY").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn currency(&self) -> Result<&'static Currency> {
        iso::find(&self.currency.to_uppercase())
            .ok_or_else(|| anyhow!("unknown currency code {}", self.currency))
    }

    pub fn swipe(&self) -> SwipeConfig {
        SwipeConfig {
            viewport_width: self.review.viewport_width,
            threshold: self.review.threshold,
        }
    }

    pub fn db_uri(&self) -> String {
        if self.db_file.starts_with("sqlite:") {
            self.db_file.clone()
        } else {
            format!("sqlite://{}", self.db_file)
        }
    }
}

fn default_data_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
        .join(CLIENT_NAME)
        .join(format!("{}.db", CLIENT_NAME))
        .display()
        .to_string()
}

pub(crate) fn default_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
        .join(CLIENT_NAME)
        .join(CONFIG_NAME)
        .display()
        .to_string()
}
