//! Configuration loading and representation.
//!
//! Everything is read once from the environment in `main` and passed down
//! explicitly; nothing here is global.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const BOT_TOKEN: &str = "BOT_TOKEN";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const BIND_ADDR: &str = "BIND_ADDR";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Process configuration.
#[derive(Clone)]
pub struct Config {
    /// Transport credential shared with the chat platform (opaque).
    pub bot_token: String,
    /// `None` selects the in-memory store (dev mode).
    pub database: Option<DatabaseConfig>,
    pub bind_addr: SocketAddr,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    /// Connection string (opaque).
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

// Secrets never reach logs.
impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("database", &self.database)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (the environment in production, a map
    /// in tests). Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get(BOT_TOKEN).ok_or(ConfigError::Missing(BOT_TOKEN))?;

        let database = match get(DATABASE_URL) {
            Some(url) => {
                let max_connections = match get(DATABASE_MAX_CONNECTIONS) {
                    Some(raw) => parse_max_connections(&raw)?,
                    None => DEFAULT_MAX_CONNECTIONS,
                };
                Some(DatabaseConfig {
                    url,
                    max_connections,
                    acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
                })
            }
            None => None,
        };

        let bind_addr = get(BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: BIND_ADDR,
                reason: e.to_string(),
            })?;

        Ok(Self {
            bot_token,
            database,
            bind_addr,
        })
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: DATABASE_MAX_CONNECTIONS,
        reason,
    };
    let n = raw.trim().parse::<u32>().map_err(|e| invalid(e.to_string()))?;
    if n == 0 {
        return Err(invalid("must be at least 1".to_string()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn bot_token_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(BOT_TOKEN));

        let err = Config::from_lookup(lookup(&[(BOT_TOKEN, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(BOT_TOKEN));
    }

    #[test]
    fn defaults_apply_without_database() {
        let cfg = Config::from_lookup(lookup(&[(BOT_TOKEN, "secret")])).unwrap();
        assert_eq!(cfg.bot_token, "secret");
        assert!(cfg.database.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn database_settings_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            (BOT_TOKEN, "secret"),
            (DATABASE_URL, "postgres://milk@localhost/milk"),
            (DATABASE_MAX_CONNECTIONS, "12"),
            (BIND_ADDR, "127.0.0.1:9000"),
        ]))
        .unwrap();

        let db = cfg.database.unwrap();
        assert_eq!(db.url, "postgres://milk@localhost/milk");
        assert_eq!(db.max_connections, 12);
        assert_eq!(cfg.bind_addr.port(), 9000);
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let err = Config::from_lookup(lookup(&[
            (BOT_TOKEN, "secret"),
            (DATABASE_URL, "postgres://x"),
            (DATABASE_MAX_CONNECTIONS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: DATABASE_MAX_CONNECTIONS, .. }));

        let err = Config::from_lookup(lookup(&[(BOT_TOKEN, "secret"), (BIND_ADDR, "nowhere")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: BIND_ADDR, .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = Config::from_lookup(lookup(&[
            (BOT_TOKEN, "top-secret-token"),
            (DATABASE_URL, "postgres://user:hunter2@db/milk"),
        ]))
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("top-secret-token"));
        assert!(!rendered.contains("hunter2"));
    }
}
