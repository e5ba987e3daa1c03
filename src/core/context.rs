//! Application context
//!
//! Everything a request handler may need, built once at startup and shared
//! behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use crate::core::accounts::AccountStore;
use crate::core::auth::{TokenConfig, TokenService};
use crate::core::characters::CharacterService;
use crate::core::config::{Config, ConfigError, StoreKind};
use crate::core::db::{
    AccountRepository, CharacterRepository, DbError, GraphStore, RelationalStore,
    create_pool_with_migrations, pool::health_check,
};
use crate::core::id::{IdError, IdGenerator};

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ID generator error: {0}")]
    Id(#[from] IdError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Postgres store selected but no database configured")]
    MissingDatabase,

    #[error("Failed to load TLS certificate or key: {0}")]
    Tls(std::io::Error),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppContext {
    pub ids: Arc<IdGenerator>,
    pub accounts: AccountStore,
    pub characters: CharacterService,
    pub tokens: TokenService,
    pub dev_mode: bool,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("ids", &self.ids)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Assemble a context over the given repositories
    pub fn new(
        ids: Arc<IdGenerator>,
        account_repo: Arc<dyn AccountRepository>,
        character_repo: Arc<dyn CharacterRepository>,
        tokens: TokenConfig,
        storage_timeout: Duration,
        dev_mode: bool,
    ) -> Self {
        let accounts = AccountStore::new(account_repo, ids.clone()).deadline(storage_timeout);
        let characters = CharacterService::new(character_repo, ids.clone()).deadline(storage_timeout);
        let tokens = TokenService::new(tokens, accounts.clone());

        Self {
            ids,
            accounts,
            characters,
            tokens,
            dev_mode,
        }
    }

    /// Context over a fresh in-process graph store on node 0
    pub fn in_memory(secret: &str, dev_mode: bool) -> Result<Self, StartupError> {
        let ids = Arc::new(IdGenerator::new(0)?);
        let store = Arc::new(GraphStore::new());

        Ok(Self::new(
            ids,
            store.clone(),
            store,
            TokenConfig::new(secret),
            crate::core::accounts::service::DEFAULT_STORAGE_DEADLINE,
            dev_mode,
        ))
    }

    /// Build the context described by `config`, connecting to storage
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let ids = Arc::new(IdGenerator::new(config.node_id)?);
        let tokens = TokenConfig::new(config.auth_key.clone()).ttl_hours(config.token_ttl_hours);

        let (account_repo, character_repo): (
            Arc<dyn AccountRepository>,
            Arc<dyn CharacterRepository>,
        ) = match config.store {
            StoreKind::Postgres => {
                let db_config = config.db_config().ok_or(StartupError::MissingDatabase)?;

                let pool = create_pool_with_migrations(&db_config).await?;
                health_check(&pool).await?;
                tracing::info!(
                    max_connections = db_config.max_connections,
                    "Connected to PostgreSQL"
                );

                let store = Arc::new(RelationalStore::new(pool));
                (
                    store.clone() as Arc<dyn AccountRepository>,
                    store as Arc<dyn CharacterRepository>,
                )
            }
            StoreKind::Graph => {
                tracing::warn!("Using in-process graph store; data is lost on restart");
                let store = Arc::new(GraphStore::new());
                (
                    store.clone() as Arc<dyn AccountRepository>,
                    store as Arc<dyn CharacterRepository>,
                )
            }
        };

        Ok(Self::new(
            ids,
            account_repo,
            character_repo,
            tokens,
            config.storage_timeout,
            config.dev_mode,
        ))
    }
}
