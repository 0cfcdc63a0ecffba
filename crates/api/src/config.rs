//! Process configuration for the API binary.

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

use wayfare_infra::{ConfigError, StoreConfig};

pub const BIND_ADDR: &str = "WAYFARE_BIND_ADDR";
pub const JWT_SECRET: &str = "JWT_SECRET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ApiConfigError {
    #[error(transparent)]
    Store(#[from] ConfigError),

    #[error("WAYFARE_BIND_ADDR is not a socket address: {0:?}")]
    InvalidBindAddr(String),
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Secret the backend's auth service signs access tokens with (HS256).
    pub jwt_secret: String,
    pub store: StoreConfig,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("store", &self.store.postgrest.as_ref().map(|p| &p.url))
            .finish()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse()
            .map_err(|_| ApiConfigError::InvalidBindAddr(raw_addr.clone()))?;

        let jwt_secret = match lookup(JWT_SECRET).filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let store = StoreConfig::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            store,
        })
    }
}
