use std::fmt;
use std::time::Duration;

use crate::feeds::{self, FeedSource, ProxyConfig};
use crate::models::meeting::MAX_RETENTION_DAYS;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
    SourcesFile { path: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
            ConfigError::Invalid { key, reason } => write!(f, "Invalid {key}: {reason}"),
            ConfigError::SourcesFile { path, reason } => {
                write!(f, "Cannot load feed sources from {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub admin_secret: Option<String>,
    pub feed_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub sync_hour_utc: u32,
    pub sync_on_startup: bool,
    pub stale_after_days: Option<i64>,
    pub proxy: Option<ProxyConfig>,
    pub sources: Vec<FeedSource>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let proxy = match (get("PROXY_ENDPOINT"), get("PROXY_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(ProxyConfig { endpoint, api_key }),
            (Some(_), None) => return Err(ConfigError::Missing("PROXY_API_KEY")),
            _ => None,
        };

        let sources = match get("FEED_SOURCES_FILE") {
            Some(path) => load_sources(&path)?,
            None => feeds::default_sources(),
        };

        let sync_hour_utc: u32 = parse_or(get("SYNC_HOUR_UTC"), "SYNC_HOUR_UTC", 3)?;
        if sync_hour_utc > 23 {
            return Err(ConfigError::Invalid {
                key: "SYNC_HOUR_UTC",
                reason: format!("{sync_hour_utc} is not an hour of the day"),
            });
        }

        let stale_after_days = match get("STALE_AFTER_DAYS") {
            Some(v) => {
                let days: i64 = parse_or(Some(v), "STALE_AFTER_DAYS", 0)?;
                if !(1..=MAX_RETENTION_DAYS).contains(&days) {
                    return Err(ConfigError::Invalid {
                        key: "STALE_AFTER_DAYS",
                        reason: format!("must be between 1 and {MAX_RETENTION_DAYS}"),
                    });
                }
                Some(days)
            }
            None => None,
        };

        Ok(Self {
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            admin_secret: get("ADMIN_SECRET"),
            feed_timeout: Duration::from_secs(parse_or(get("FEED_TIMEOUT_SECS"), "FEED_TIMEOUT_SECS", 30)?),
            max_concurrent_fetches: parse_or(get("MAX_CONCURRENT_FETCHES"), "MAX_CONCURRENT_FETCHES", 4)?,
            sync_hour_utc,
            sync_on_startup: parse_bool(get("SYNC_ON_STARTUP"), "SYNC_ON_STARTUP")?,
            stale_after_days,
            proxy,
            sources,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("'{v}': {e}"),
        }),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

/// Read a JSON array of feed sources.
pub fn load_sources(path: &str) -> Result<Vec<FeedSource>, ConfigError> {
    let err = |reason: String| ConfigError::SourcesFile {
        path: path.to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
    let sources: Vec<FeedSource> = serde_json::from_str(&raw).map_err(|e| err(e.to_string()))?;

    let mut names = std::collections::HashSet::new();
    for source in &sources {
        if !names.insert(source.name.as_str()) {
            return Err(err(format!("duplicate source name '{}'", source.name)));
        }
    }
    Ok(sources)
}
