//! Config module contains the top-level config for the app.

use config_crate::{Config as RawConfig, ConfigError, Environment, File};
use std::env;

/// Basic settings - database, payment gateway and fee policy
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub gateway: Gateway,
    pub fees: Fees,
}

/// Common server settings
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub database: String,
    pub thread_count: usize,
}

/// Payment gateway settings. An empty `secret_key` means the gateway is
/// unconfigured and the embedding service should wire the mock (demo mode).
#[derive(Debug, Deserialize, Clone)]
pub struct Gateway {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
}

/// Marketplace fee policy
#[derive(Debug, Deserialize, Clone)]
pub struct Fees {
    /// Platform commission as a fraction of the booking total
    pub platform_percent: f64,
    /// Full refund when cancelling at least this many hours before start
    pub full_refund_hours: i64,
    /// Half refund when cancelling at least this many hours before start
    pub half_refund_hours: i64,
}

/// Creates new app config struct
/// #Examples
/// ```
/// use parkalot_lib::config::*;
///
/// let config = Config::new();
/// ```
impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();
        s.merge(File::with_name("config/base"))?;

        // Note that this file is _optional_
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        s.merge(File::with_name(&format!("config/{}", env)).required(false))?;

        // Add in settings from the environment (with a prefix of PARKALOT)
        s.merge(Environment::with_prefix("PARKALOT"))?;

        s.try_into()
    }
}
