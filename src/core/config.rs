//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.
//! Secrets may be given inline or as a path to a file holding them; files are
//! read once here and never again.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::auth::{DEFAULT_TOKEN_TTL_HOURS, MAX_TOKEN_TTL_HOURS};
use crate::core::db::{DbConfig, DbTarget};
use crate::core::id::MAX_NODE_ID;

const DEFAULT_LOBBY_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_TIMEOUT_SECS: u64 = 5;

/// Which storage backend serves accounts and characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// PostgreSQL via sqlx
    #[default]
    Postgres,
    /// In-process graph, lost on restart
    Graph,
}

/// Certificate chain and private key served by the lobby listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM certificate chain (`SPIRE_LOBBY_CERTIFICATE_FILE`)
    pub certificate: PathBuf,
    /// PEM private key (`SPIRE_LOBBY_PRIVATE_KEY_FILE`)
    pub private_key: PathBuf,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read {key} from {}: {source}", .path.display())]
    SecretFile {
        key: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} is empty")]
    EmptySecret(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Listen address (`SPIRE_LOBBY_ADDR`)
    pub lobby_addr: SocketAddr,

    /// Serve HTTPS when set; plain HTTP otherwise
    pub tls: Option<TlsFiles>,

    /// Storage backend (`SPIRE_STORE`)
    pub store: StoreKind,

    /// Database location; always set when `store` is `Postgres`
    pub database: Option<DbTarget>,

    /// Pool size override (`SPIRE_DB_MAX_CONNECTIONS`)
    pub db_max_connections: Option<u32>,

    /// Pool acquire timeout override (`SPIRE_DB_CONNECT_TIMEOUT_SECS`)
    pub db_connect_timeout_secs: Option<u64>,

    /// Bound on each storage call (`SPIRE_DB_TIMEOUT_SECS`)
    pub storage_timeout: Duration,

    /// Token signing secret
    pub auth_key: String,

    /// Generator node id (`SPIRE_NODE_ID`)
    pub node_id: u16,

    /// Serve the dev account routes (`SPIRE_DEV_MODE`)
    pub dev_mode: bool,

    /// Token lifetime (`SPIRE_TOKEN_TTL_HOURS`)
    pub token_ttl_hours: i64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("lobby_addr", &self.lobby_addr)
            .field("tls", &self.tls)
            .field("store", &self.store)
            .field("database", &self.database)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_connect_timeout_secs", &self.db_connect_timeout_secs)
            .field("storage_timeout", &self.storage_timeout)
            .field("auth_key", &"[REDACTED]")
            .field("node_id", &self.node_id)
            .field("dev_mode", &self.dev_mode)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let lobby_addr = parse_or(&var, "SPIRE_LOBBY_ADDR", || {
            DEFAULT_LOBBY_ADDR.parse().map_err(|_| ConfigError::Invalid {
                key: "SPIRE_LOBBY_ADDR",
                value: DEFAULT_LOBBY_ADDR.to_string(),
            })
        })?;

        let tls = match (
            var("SPIRE_LOBBY_CERTIFICATE_FILE"),
            var("SPIRE_LOBBY_PRIVATE_KEY_FILE"),
        ) {
            (Some(certificate), Some(private_key)) => Some(TlsFiles {
                certificate: PathBuf::from(certificate),
                private_key: PathBuf::from(private_key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SPIRE_LOBBY_PRIVATE_KEY_FILE")),
            (None, Some(_)) => return Err(ConfigError::Missing("SPIRE_LOBBY_CERTIFICATE_FILE")),
        };

        let store = match var("SPIRE_STORE") {
            None => StoreKind::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => StoreKind::Postgres,
                "graph" | "memory" => StoreKind::Graph,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SPIRE_STORE",
                        value,
                    });
                }
            },
        };

        let database = match store {
            StoreKind::Postgres => Some(database_target(&var)?),
            StoreKind::Graph => None,
        };

        let db_max_connections = match var("SPIRE_DB_MAX_CONNECTIONS") {
            Some(value) => Some(parse_value("SPIRE_DB_MAX_CONNECTIONS", value)?),
            None => None,
        };

        let db_connect_timeout_secs = match var("SPIRE_DB_CONNECT_TIMEOUT_SECS") {
            Some(value) => Some(parse_value("SPIRE_DB_CONNECT_TIMEOUT_SECS", value)?),
            None => None,
        };

        let storage_timeout = Duration::from_secs(parse_or(&var, "SPIRE_DB_TIMEOUT_SECS", || {
            Ok(DEFAULT_DB_TIMEOUT_SECS)
        })?);

        let auth_key = secret(&var, "SPIRE_AUTH_KEY", "SPIRE_AUTH_KEY_FILE")?;

        let node_id: u16 = parse_or(&var, "SPIRE_NODE_ID", || Ok(0))?;
        if node_id > MAX_NODE_ID {
            return Err(ConfigError::Invalid {
                key: "SPIRE_NODE_ID",
                value: node_id.to_string(),
            });
        }

        let dev_mode = match var("SPIRE_DEV_MODE") {
            Some(value) => parse_bool("SPIRE_DEV_MODE", value)?,
            None => false,
        };

        let token_ttl_hours: i64 = parse_or(&var, "SPIRE_TOKEN_TTL_HOURS", || {
            Ok(DEFAULT_TOKEN_TTL_HOURS)
        })?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "SPIRE_TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            lobby_addr,
            tls,
            store,
            database,
            db_max_connections,
            db_connect_timeout_secs,
            storage_timeout,
            auth_key,
            node_id,
            dev_mode,
            token_ttl_hours,
        })
    }
}

impl Config {
    /// Pool settings for the configured database, if any
    pub fn db_config(&self) -> Option<DbConfig> {
        let mut db_config = DbConfig::new(self.database.clone()?);
        if let Some(max) = self.db_max_connections {
            db_config = db_config.max_connections(max);
        }
        if let Some(secs) = self.db_connect_timeout_secs {
            db_config = db_config.connect_timeout(secs);
        }
        Some(db_config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_or<T, V, D>(var: &V, key: &'static str, default: D) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match var(key) {
        Some(value) => parse_value(key, value),
        None => default(),
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

/// Inline value wins; otherwise the file named by `file_key` is read
fn secret<V>(var: &V, key: &'static str, file_key: &'static str) -> Result<String, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(key) {
        return Ok(value.trim().to_string());
    }

    let path = PathBuf::from(var(file_key).ok_or(ConfigError::Missing(file_key))?);
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::SecretFile {
        key: file_key,
        path,
        source,
    })?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptySecret(file_key));
    }
    Ok(trimmed.to_string())
}

fn database_target<V>(var: &V) -> Result<DbTarget, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("DATABASE_URL") {
        return Ok(DbTarget::Url(url));
    }

    let host = var("SPIRE_DB_HOST").ok_or(ConfigError::Missing("SPIRE_DB_HOST"))?;
    let port = parse_or(var, "SPIRE_DB_PORT", || Ok(DEFAULT_DB_PORT))?;
    let name = var("SPIRE_DB_NAME").ok_or(ConfigError::Missing("SPIRE_DB_NAME"))?;
    let user = var("SPIRE_DB_USER").ok_or(ConfigError::Missing("SPIRE_DB_USER"))?;
    let password = secret(var, "SPIRE_DB_PASSWORD", "SPIRE_DB_PASSWORD_FILE")?;

    Ok(DbTarget::Parts {
        host,
        port,
        name,
        user,
        password,
    })
}
