use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::services::category_service::CategoryDeletePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where item photos are listed from.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageSettings {
    Gcs {
        bucket: String,
    },
    R2 {
        bucket: String,
        account_id: String,
        access_key: String,
        secret_key: String,
    },
    None,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: Option<String>,
    pub storage: StorageSettings,
    pub image_url_ttl: Duration,
    pub operation_timeout: Duration,
    /// Console sessions unused for this long are dropped.
    pub session_idle_ttl: Duration,
    pub category_delete_policy: CategoryDeletePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let storage = match var("STORAGE_BACKEND").as_deref().unwrap_or("none") {
            "gcs" => StorageSettings::Gcs {
                bucket: required("GCS_BUCKET")?,
            },
            "r2" => StorageSettings::R2 {
                bucket: required("R2_BUCKET")?,
                account_id: required("R2_ACCOUNT_ID")?,
                access_key: required("R2_ACCESS_KEY")?,
                secret_key: required("R2_SECRET_KEY")?,
            },
            "none" => StorageSettings::None,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            server_host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", var("SERVER_PORT"), 50051)?,
            jwt_secret: var("JWT_SECRET"),
            storage,
            image_url_ttl: positive_secs("IMAGE_URL_TTL_SECS", var("IMAGE_URL_TTL_SECS"), 3600)?,
            operation_timeout: positive_secs(
                "OPERATION_TIMEOUT_SECS",
                var("OPERATION_TIMEOUT_SECS"),
                15,
            )?,
            session_idle_ttl: positive_secs(
                "SESSION_IDLE_TTL_SECS",
                var("SESSION_IDLE_TTL_SECS"),
                1800,
            )?,
            category_delete_policy: parse_or(
                "CATEGORY_DELETE_POLICY",
                var("CATEGORY_DELETE_POLICY"),
                CategoryDeletePolicy::Restrict,
            )?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// A whole number of seconds; zero is rejected.
fn positive_secs(
    name: &'static str,
    raw: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match parse_or(name, raw, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
