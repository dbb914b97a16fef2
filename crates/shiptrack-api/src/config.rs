//! Server configuration read from the environment at startup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shiptrack_shipments::application::notifications::DEFAULT_CHANNEL_CAPACITY;
use shiptrack_store::http_blob::{HttpBlobConfig, RetryPolicy};

use crate::error::AppError;

/// Which `ShipmentStore` adapter backs the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store, lost on restart.
    Memory,
    /// Remote JSON blob.
    Http(HttpBlobConfig),
    /// PostgreSQL table.
    Postgres {
        /// Connection string.
        database_url: String,
    },
}

impl StoreBackend {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Http(_) => "http",
            Self::Postgres { .. } => "postgres",
        }
    }
}

/// Everything `main` needs to wire the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    /// YAML file of demo shipments loaded into an empty store.
    pub seed_file: Option<PathBuf>,
    /// Changes buffered per bus subscriber.
    pub notify_capacity: usize,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or malformed.
    pub fn from_env() -> Result<Self, AppError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Reads the configuration from an explicit variable map.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let backend = match get("STORE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => StoreBackend::Memory,
            "http" => {
                let url = get("BLOB_STORE_URL").ok_or_else(|| {
                    AppError::Config("BLOB_STORE_URL must be set when STORE_BACKEND=http".into())
                })?;
                let defaults = RetryPolicy::default();
                StoreBackend::Http(HttpBlobConfig {
                    url,
                    api_key: get("BLOB_STORE_API_KEY"),
                    timeout: Duration::from_secs(parse_or(vars, "STORE_TIMEOUT_SECS", 15)?),
                    retry: RetryPolicy {
                        max_attempts: parse_or(vars, "STORE_MAX_ATTEMPTS", defaults.max_attempts)?
                            .max(1),
                        base_backoff_ms: parse_or(
                            vars,
                            "STORE_BACKOFF_MS",
                            defaults.base_backoff_ms,
                        )?,
                    },
                })
            }
            "postgres" => StoreBackend::Postgres {
                database_url: get("DATABASE_URL").ok_or_else(|| {
                    AppError::Config("DATABASE_URL must be set when STORE_BACKEND=postgres".into())
                })?,
            },
            other => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be memory, http or postgres, got {other:?}"
                )));
            }
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(vars, "PORT", 3000)?,
            backend,
            seed_file: get("SEED_FILE").map(PathBuf::from),
            notify_capacity: parse_or(vars, "NOTIFY_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `host:port` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name).map(|value| value.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
    }
}
