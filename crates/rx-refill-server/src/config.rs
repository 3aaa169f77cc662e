//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const BIND_VAR: &str = "RX_REFILL_BIND";
pub const DB_VAR: &str = "RX_REFILL_DB";
pub const SWEEP_VAR: &str = "RX_REFILL_REMINDER_SWEEP_SECS";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,rx_refill_core=debug";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DB: &str = "rx-refill.db";
const DEFAULT_SWEEP_SECS: u64 = 86_400;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidBind { var: &'static str, value: String },

    #[error("{var} must be a positive number of seconds: {value}")]
    InvalidInterval { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database_path: PathBuf,
    /// How often due refill reminders are swept
    pub reminder_sweep_interval: Duration,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_value = lookup(BIND_VAR).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_value.trim().parse::<SocketAddr>().map_err(|_| ConfigError::InvalidBind {
            var: BIND_VAR,
            value: bind_value.clone(),
        })?;

        let database_path = lookup(DB_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

        let reminder_sweep_interval = match lookup(SWEEP_VAR) {
            None => Duration::from_secs(DEFAULT_SWEEP_SECS),
            Some(value) => {
                let secs = value.trim().parse::<u64>().ok().filter(|s| *s > 0);
                match secs {
                    Some(secs) => Duration::from_secs(secs),
                    None => {
                        return Err(ConfigError::InvalidInterval {
                            var: SWEEP_VAR,
                            value,
                        })
                    }
                }
            }
        };

        Ok(Self {
            bind,
            database_path,
            reminder_sweep_interval,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_path: PathBuf::from(DEFAULT_DB),
            reminder_sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECS),
        }
    }
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
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (BIND_VAR, "0.0.0.0:9000"),
            (DB_VAR, "/var/lib/rx/rx.db"),
            (SWEEP_VAR, "60"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.database_path, PathBuf::from("/var/lib/rx/rx.db"));
        assert_eq!(config.reminder_sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(BIND_VAR, "localhost")])),
            Err(ConfigError::InvalidBind { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(SWEEP_VAR, "0")])),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(SWEEP_VAR, "daily")])),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }
}
