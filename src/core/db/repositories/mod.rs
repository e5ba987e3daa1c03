//! Storage capabilities for the lobby
//!
//! The rest of the crate only talks to [`AccountRepository`] and
//! [`CharacterRepository`]. Two backends implement them:
//! - [`RelationalStore`]: PostgreSQL through SQLx
//! - [`GraphStore`]: in-process property graph, for local runs and tests

pub mod graph;
pub mod relational;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::db::models::{Account, AccountId, Character, DevAccount, NewCharacter};

pub use graph::GraphStore;
pub use relational::RelationalStore;

/// Repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Dev ID already bound to an account")]
    DuplicateDevId,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Storage deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Account and identity-binding persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert the account and its dev binding as one atomic unit.
    ///
    /// Fails with [`RepositoryError::DuplicateDevId`] when `dev_id` is taken,
    /// in which case neither record is stored.
    async fn create_dev_account(
        &self,
        account_id: AccountId,
        dev_id: &str,
    ) -> Result<Account, RepositoryError>;

    async fn find_by_dev_id(&self, dev_id: &str) -> Result<Option<DevAccount>, RepositoryError>;

    async fn find_privilege(&self, account_id: AccountId)
    -> Result<Option<String>, RepositoryError>;
}

/// Character persistence
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    async fn create_character(
        &self,
        character: &NewCharacter,
    ) -> Result<Character, RepositoryError>;

    /// Characters owned by `account_id`, newest first
    async fn list_characters(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, RepositoryError>;
}

/// Run a repository call under a deadline.
///
/// Dropping the future on timeout drops any open transaction, which rolls
/// it back.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::DeadlineExceeded(deadline)),
    }
}
