//! Centralized configuration for customers-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// What the owner lookup does with the thirdparty call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalCallMode {
    /// Call, log the result, and keep serving the read if the call fails.
    Isolate,
    /// Call and fail the read when the call fails.
    Propagate,
    /// Skip the call.
    Off,
}

impl ExternalCallMode {
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "isolate" => Ok(Self::Isolate),
            "propagate" => Ok(Self::Propagate),
            "off" => Ok(Self::Off),
            _ => Err(ConfigError {
                field: "EXTERNAL_CALL_MODE",
                message: format!("'{}' is not one of isolate, propagate, off", s),
            }),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8081)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    #[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
    pub db_path: Option<PathBuf>,
    /// Log format
    pub log_format: LogFormat,
    /// Base URL of the thirdparty service
    pub thirdparty_base_url: String,
    /// Request timeout for the thirdparty call; none means wait indefinitely
    pub thirdparty_timeout: Option<Duration>,
    /// Handling of the thirdparty call on owner lookup
    pub external_call_mode: ExternalCallMode,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Port
        let port = match env::var("PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("'{}' is not a valid port", s),
            })?,
            Err(_) => 8081,
        };

        // CORS allow origin
        let cors_origin_str = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let storage_provider = StorageProvider::from_str(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "sqlite".into()),
        );

        // DB path (for sqlite)
        let db_path = env::var("DB_PATH").ok().map(PathBuf::from);

        // Log format
        let log_format =
            LogFormat::from_str(&env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()));

        // Thirdparty service
        let thirdparty_base_url = env::var("THIRDPARTY_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| thirdparty_client::DEFAULT_BASE_URL.to_string());
        if !(thirdparty_base_url.starts_with("http://")
            || thirdparty_base_url.starts_with("https://"))
        {
            return Err(ConfigError {
                field: "THIRDPARTY_BASE_URL",
                message: "must start with http:// or https://".into(),
            });
        }

        let thirdparty_timeout = match env::var("THIRDPARTY_TIMEOUT_MS") {
            Ok(s) if !s.is_empty() => Some(parse_timeout_ms(&s)?),
            _ => None,
        };

        let external_call_mode = ExternalCallMode::from_str(
            &env::var("EXTERNAL_CALL_MODE").unwrap_or_else(|_| "isolate".into()),
        )?;

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
            thirdparty_base_url,
            thirdparty_timeout,
            external_call_mode,
        })
    }

    /// Log warnings about configuration that deviates from safe defaults.
    pub fn warn_if_risky(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: owners are lost on restart.");
        }
        if self.thirdparty_timeout.is_none() && self.external_call_mode != ExternalCallMode::Off {
            tracing::warn!(
                "THIRDPARTY_TIMEOUT_MS not set: owner lookups wait for the thirdparty \
                 service until the transport gives up."
            );
        }
    }
}

fn parse_timeout_ms(s: &str) -> Result<Duration, ConfigError> {
    match s.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError {
            field: "THIRDPARTY_TIMEOUT_MS",
            message: format!("'{}' is not a positive number of milliseconds", s),
        }),
    }
}
