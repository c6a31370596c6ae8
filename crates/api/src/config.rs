//! Process configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

pub const BIND_ADDR_ENV: &str = "DISPATCH_BIND_ADDR";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const SEED_DEMO_ENV: &str = "DISPATCH_SEED_DEMO";
pub const RNG_SEED_ENV: &str = "DISPATCH_RNG_SEED";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. Only honored with the `postgres` feature.
    pub database_url: Option<String>,
    /// Load demo depots, items, units and orders into an empty store at startup.
    pub seed_demo: bool,
    /// Fixed seed for unit selection; entropy when absent.
    pub rng_seed: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            seed_demo: true,
            rng_seed: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| invalid(BIND_ADDR_ENV, &bind_raw, e))?;

        let database_url = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty());

        let seed_demo = match lookup(SEED_DEMO_ENV) {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                invalid(SEED_DEMO_ENV, &raw, "expected true/false")
            })?,
        };

        let rng_seed = match lookup(RNG_SEED_ENV) {
            None => None,
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| invalid(RNG_SEED_ENV, &raw, e))?,
            ),
        };

        Ok(Self {
            bind_addr,
            database_url,
            seed_demo,
            rng_seed,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config_from(&[]).unwrap(), ApiConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            (BIND_ADDR_ENV, "127.0.0.1:9000"),
            (DATABASE_URL_ENV, "postgres://localhost/dispatch"),
            (SEED_DEMO_ENV, "false"),
            (RNG_SEED_ENV, "42"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/dispatch"));
        assert!(!config.seed_demo);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn blank_database_url_is_ignored() {
        let config = config_from(&[(DATABASE_URL_ENV, "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[(RNG_SEED_ENV, "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: RNG_SEED_ENV, .. }));

        let err = config_from(&[(SEED_DEMO_ENV, "maybe")]).unwrap_err();
        assert!(err.to_string().contains(SEED_DEMO_ENV));

        let err = config_from(&[(BIND_ADDR_ENV, "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: BIND_ADDR_ENV, .. }));
    }
}
