//! Store backend configuration from environment variables.
//!
//! Values are read through a lookup function so callers (and tests) can supply
//! their own source; [`StoreConfig::from_env`] uses the process environment.

use std::time::Duration;

use thiserror::Error;

pub const STORE_URL: &str = "WAYFARE_STORE_URL";
pub const STORE_ANON_KEY: &str = "WAYFARE_STORE_ANON_KEY";
pub const STORE_TIMEOUT_SECS: &str = "WAYFARE_STORE_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingKey(&'static str),

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Connection settings for a PostgREST-compatible backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgrestSettings {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

/// Which backend to use. `postgrest: None` selects the in-memory backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub postgrest: Option<PostgrestSettings>,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(url) = get(STORE_URL) else {
            return Ok(Self::default());
        };
        let anon_key = get(STORE_ANON_KEY).ok_or(ConfigError::MissingKey(STORE_ANON_KEY))?;

        let timeout_secs = match get(STORE_TIMEOUT_SECS) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: STORE_TIMEOUT_SECS,
                        value: raw,
                    });
                }
            },
        };

        Ok(Self {
            postgrest: Some(PostgrestSettings {
                url: url.trim().to_string(),
                anon_key,
                timeout: Duration::from_secs(timeout_secs),
            }),
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.postgrest.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StoreConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn no_url_means_in_memory() {
        let cfg = load(&[]).unwrap();
        assert!(cfg.is_in_memory());

        let cfg = load(&[(STORE_URL, "   ")]).unwrap();
        assert!(cfg.is_in_memory());
    }

    #[test]
    fn url_requires_key_and_defaults_timeout() {
        assert_eq!(
            load(&[(STORE_URL, "https://db.example")]),
            Err(ConfigError::MissingKey(STORE_ANON_KEY))
        );

        let cfg = load(&[(STORE_URL, "https://db.example"), (STORE_ANON_KEY, "k")]).unwrap();
        let pg = cfg.postgrest.unwrap();
        assert_eq!(pg.url, "https://db.example");
        assert_eq!(pg.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn timeout_must_be_a_positive_integer() {
        let base = [(STORE_URL, "https://db.example"), (STORE_ANON_KEY, "k")];

        let mut pairs = base.to_vec();
        pairs.push((STORE_TIMEOUT_SECS, "3"));
        assert_eq!(
            load(&pairs).unwrap().postgrest.unwrap().timeout,
            Duration::from_secs(3)
        );

        for bad in ["0", "-1", "soon"] {
            let mut pairs = base.to_vec();
            pairs.push((STORE_TIMEOUT_SECS, bad));
            assert!(matches!(load(&pairs), Err(ConfigError::InvalidNumber { .. })));
        }
    }
}
