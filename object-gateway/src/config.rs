//! Configuration module for the Object Gateway
//!
//! Settings come from environment variables (a `.env` file is honoured) with
//! defaults for everything except what the selected storage backend needs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::observability::{LogConfig, LogFormat, LogLevel};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main configuration structure for the Object Gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix every object route is nested under
    pub base_path: String,
    /// Upper bound on the time to produce a response head
    pub request_timeout_seconds: u64,
    pub max_upload_size_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub connect_timeout_seconds: u64,
    pub operation_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::S3)?;

        let bucket = match (lookup("S3_BUCKET"), backend) {
            (Some(bucket), _) => bucket,
            (None, StorageBackend::Memory) => "files".to_string(),
            (None, StorageBackend::S3) => {
                return Err(ConfigError::EnvVarNotFound("S3_BUCKET".to_string()))
            }
        };

        let config = Self {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "SERVER_PORT", 8080)?,
                base_path: lookup("BASE_PATH").unwrap_or_else(|| "/files".to_string()),
                request_timeout_seconds: parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?,
                max_upload_size_mb: parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", 100)?,
            },
            storage: StorageConfig {
                backend,
                bucket,
                endpoint: lookup("S3_ENDPOINT").filter(|s| !s.is_empty()),
                region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: lookup("S3_ACCESS_KEY_ID").filter(|s| !s.is_empty()),
                secret_access_key: lookup("S3_SECRET_ACCESS_KEY").filter(|s| !s.is_empty()),
                force_path_style: parse_or(&lookup, "S3_FORCE_PATH_STYLE", true)?,
                connect_timeout_seconds: parse_or(&lookup, "S3_CONNECT_TIMEOUT_SECONDS", 5)?,
                operation_timeout_seconds: parse_or(&lookup, "S3_OPERATION_TIMEOUT_SECONDS", 60)?,
            },
            logging: LoggingConfig {
                level: parse_or(&lookup, "LOG_LEVEL", LogLevel::Info)?,
                format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(invalid("SERVER_PORT", "port cannot be 0"));
        }
        if !self.server.base_path.starts_with('/') || self.server.base_path.len() < 2 {
            return Err(invalid("BASE_PATH", "must start with '/' and not be the root"));
        }
        if self.server.base_path.ends_with('/') {
            return Err(invalid("BASE_PATH", "must not end with '/'"));
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECONDS", "must be at least 1"));
        }
        if self.server.max_upload_size_mb == 0 {
            return Err(invalid("MAX_UPLOAD_SIZE_MB", "must be at least 1"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(invalid("S3_BUCKET", "bucket name cannot be empty"));
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(invalid(
                "S3_ACCESS_KEY_ID",
                "access key id and secret access key must be set together",
            ));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.server.max_upload_size_mb * 1024 * 1024
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.logging.level,
            format: self.logging.format,
            service_name: "object-gateway".to_string(),
            include_thread_ids: self.logging.format == LogFormat::Json,
            ..LogConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_path: "/files".to_string(),
                request_timeout_seconds: 30,
                max_upload_size_mb: 100,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                bucket: "files".to_string(),
                endpoint: None,
                region: "us-east-1".to_string(),
                access_key_id: None,
                secret_access_key: None,
                force_path_style: true,
                connect_timeout_seconds: 5,
                operation_timeout_seconds: 60,
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                format: LogFormat::Pretty,
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}
