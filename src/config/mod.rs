//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Maximum seconds of hit-volume history retained per character
    pub max_rewind_secs: f32,
    /// Per-client fire-claim rate limit (claims per second)
    pub claim_rate_limit: u32,
    /// Seed for the scripted headless simulation
    pub sim_seed: u64,
}

impl Config {
    /// Load configuration from environment variables; every variable has a
    /// default so the host can boot from a bare environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_rewind_secs: parse_var("MAX_REWIND_SECS", 4.0)?,
            claim_rate_limit: parse_var("CLAIM_RATE_LIMIT", 20)?,
            sim_seed: parse_var("SIM_SEED", 7)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_rewind_secs: 4.0,
            claim_rate_limit: 20,
            sim_seed: 7,
        }
    }
}

/// Parse an optional environment variable, falling back to `default`
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
