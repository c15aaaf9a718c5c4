use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineSettings;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, read once at startup and handed to whoever needs them.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_minutes: i64,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub lock_timeout: Duration,
    pub store_retries: u32,
    /// Upper bound on requests served concurrently.
    pub max_connections: usize,
}

impl Config {
    /// Read `FLOORSYNC_*` from the process environment. Call `dotenv` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("FLOORSYNC_JWT_SECRET").ok_or(ConfigError::Missing("FLOORSYNC_JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "FLOORSYNC_JWT_SECRET",
                value: "<redacted>".into(),
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
            });
        }

        let max_connections: usize = parse_or(&lookup, "FLOORSYNC_MAX_CONNECTIONS", 256)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "FLOORSYNC_MAX_CONNECTIONS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            bind: lookup("FLOORSYNC_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "FLOORSYNC_PORT", 8000)?,
            data_dir: lookup("FLOORSYNC_DATA_DIR").map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            jwt_secret,
            jwt_issuer: lookup("FLOORSYNC_JWT_ISSUER").unwrap_or_else(|| "floorsync".into()),
            jwt_expiry_minutes: parse_or(&lookup, "FLOORSYNC_JWT_EXPIRY_MINUTES", 60)?,
            metrics_port: parse_opt(&lookup, "FLOORSYNC_METRICS_PORT")?,
            compact_threshold: parse_or(&lookup, "FLOORSYNC_COMPACT_THRESHOLD", 1000)?,
            compact_interval: Duration::from_secs(parse_or(&lookup, "FLOORSYNC_COMPACT_INTERVAL_SECS", 30)?),
            lock_timeout: Duration::from_millis(parse_or(&lookup, "FLOORSYNC_LOCK_TIMEOUT_MS", 2000)?),
            store_retries: parse_or(&lookup, "FLOORSYNC_STORE_RETRIES", 3)?,
            max_connections,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("floorsync.wal")
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            lock_timeout: self.lock_timeout,
            store_retries: self.store_retries,
            ..EngineSettings::default()
        }
    }
}

fn parse_opt<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
