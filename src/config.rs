//! Runtime configuration loaded from environment variables.
//!
//! Every value has a default from `constants`; the environment only
//! overrides:
//! - `COINGECKO_API_URL`, `EXCHANGE_RATE_API_URL`, `AUTH_API_URL` and
//!   `DASHBOARD_STORAGE_DIR` for the dashboard client
//! - `DATABASE_URL`, `PORT` and `BCRYPT_COST` for the auth backend
//!
//! Binaries load a `.env` file first, so these can live there too.

use crate::{
    constants::{
        AUTH_API_URL, BCRYPT_COST, COINGECKO_API_URL, DEFAULT_DATABASE_URL, DEFAULT_SERVER_PORT,
        DEFAULT_STORAGE_DIR, EXCHANGE_RATE_API_URL,
    },
    error::ConfigError,
};
use std::path::PathBuf;
use std::str::FromStr;

/// Dashboard client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub coingecko_url: String,
    pub exchange_rate_url: String,
    pub auth_url: String,
    pub storage_dir: PathBuf,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self {
            coingecko_url: non_empty_var("COINGECKO_API_URL")
                .unwrap_or_else(|| COINGECKO_API_URL.to_string()),
            exchange_rate_url: non_empty_var("EXCHANGE_RATE_API_URL")
                .unwrap_or_else(|| EXCHANGE_RATE_API_URL.to_string()),
            auth_url: non_empty_var("AUTH_API_URL").unwrap_or_else(|| AUTH_API_URL.to_string()),
            storage_dir: non_empty_var("DASHBOARD_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
        }
    }
}

/// Auth backend configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub bcrypt_cost: u32,
}

impl ServerConfig {
    /// Loads the backend configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `PORT` or `BCRYPT_COST` is
    /// set but not a number, or the cost is outside bcrypt's 4..=31 range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let port = parse_or("PORT", non_empty_var("PORT"), DEFAULT_SERVER_PORT)?;
        let bcrypt_cost = parse_or("BCRYPT_COST", non_empty_var("BCRYPT_COST"), BCRYPT_COST)?;

        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                name: "BCRYPT_COST".to_string(),
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            database_url,
            port,
            bcrypt_cost,
        })
    }
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Parses `raw` if present, otherwise returns `default`
fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or("PORT", None, 5000u16).unwrap(), 5000);
    }

    #[test]
    fn test_parse_or_override() {
        assert_eq!(parse_or("PORT", Some(" 8080 ".to_string()), 5000u16).unwrap(), 8080);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        let err = parse_or("PORT", Some("http".to_string()), 5000u16).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PORT: http");
    }
}
