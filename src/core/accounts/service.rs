//! Account provisioning service
//!
//! Validates dev IDs, draws fresh account ids from the generator and hands
//! the atomic account + binding write to the configured repository.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::db::models::AccountId;
use crate::core::db::repositories::{AccountRepository, RepositoryError, with_deadline};
use crate::core::id::{IdError, IdGenerator};

/// Minimum dev ID length, in Unicode code points
pub const DEV_ID_MIN_LENGTH: usize = 4;

/// Maximum dev ID length, in Unicode code points
pub const DEV_ID_MAX_LENGTH: usize = 16;

/// Default bound on a single storage call
pub const DEFAULT_STORAGE_DEADLINE: Duration = Duration::from_secs(5);

/// Account service error types
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(
        "Device ID length must be between {min} and {max}",
        min = DEV_ID_MIN_LENGTH,
        max = DEV_ID_MAX_LENGTH
    )]
    InvalidDevIdLength,

    #[error("Device ID already registered")]
    Conflict,

    #[error("Account not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AccountError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateDevId => AccountError::Conflict,
            RepositoryError::AccountNotFound => AccountError::NotFound,
            _ => AccountError::Internal(err.to_string()),
        }
    }
}

impl From<IdError> for AccountError {
    fn from(err: IdError) -> Self {
        AccountError::Internal(err.to_string())
    }
}

/// Result of looking up a dev ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DevLookup {
    pub found: bool,
    pub account_id: AccountId,
}

/// Account store: provisioning and lookups over an [`AccountRepository`]
#[derive(Clone)]
pub struct AccountStore {
    repo: Arc<dyn AccountRepository>,
    ids: Arc<IdGenerator>,
    deadline: Duration,
}

impl AccountStore {
    /// Create a new account store
    pub fn new(repo: Arc<dyn AccountRepository>, ids: Arc<IdGenerator>) -> Self {
        Self {
            repo,
            ids,
            deadline: DEFAULT_STORAGE_DEADLINE,
        }
    }

    /// Set the per-call storage deadline
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Check a dev ID's length in code points
    pub fn validate_dev_id(dev_id: &str) -> Result<(), AccountError> {
        let length = dev_id.chars().count();
        if !(DEV_ID_MIN_LENGTH..=DEV_ID_MAX_LENGTH).contains(&length) {
            return Err(AccountError::InvalidDevIdLength);
        }
        Ok(())
    }

    /// Register a new dev account bound to `dev_id`
    pub async fn create_dev_account(&self, dev_id: &str) -> Result<AccountId, AccountError> {
        Self::validate_dev_id(dev_id)?;

        let account_id = AccountId(self.ids.next()?);
        let account = with_deadline(
            self.deadline,
            self.repo.create_dev_account(account_id, dev_id),
        )
        .await?;

        tracing::info!(account_id = %account.id, dev_id, "Dev account created");

        Ok(account.id)
    }

    /// Find the account bound to `dev_id`; a miss is not an error
    pub async fn lookup_by_external_id(&self, dev_id: &str) -> Result<DevLookup, AccountError> {
        let binding = with_deadline(self.deadline, self.repo.find_by_dev_id(dev_id)).await?;

        Ok(match binding {
            Some(binding) => DevLookup {
                found: true,
                account_id: binding.account_id,
            },
            None => DevLookup {
                found: false,
                account_id: AccountId::default(),
            },
        })
    }

    /// Privilege of an existing account
    pub async fn get_privilege(&self, account_id: AccountId) -> Result<String, AccountError> {
        with_deadline(self.deadline, self.repo.find_privilege(account_id))
            .await?
            .ok_or(AccountError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::models::{Account, DevAccount};
    use crate::core::db::repositories::GraphStore;
    use async_trait::async_trait;

    fn create_test_store() -> (AccountStore, GraphStore) {
        let graph = GraphStore::new();
        let ids = Arc::new(IdGenerator::new(1).unwrap());
        (AccountStore::new(Arc::new(graph.clone()), ids), graph)
    }

    /// Repository whose calls never complete
    struct StalledRepository;

    #[async_trait]
    impl AccountRepository for StalledRepository {
        async fn create_dev_account(
            &self,
            _account_id: AccountId,
            _dev_id: &str,
        ) -> Result<Account, RepositoryError> {
            std::future::pending().await
        }

        async fn find_by_dev_id(
            &self,
            _dev_id: &str,
        ) -> Result<Option<DevAccount>, RepositoryError> {
            std::future::pending().await
        }

        async fn find_privilege(
            &self,
            _account_id: AccountId,
        ) -> Result<Option<String>, RepositoryError> {
            std::future::pending().await
        }
    }

    // ========================================================================
    // Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_dev_id_bounds() {
        assert!(AccountStore::validate_dev_id("abc").is_err());
        assert!(AccountStore::validate_dev_id("abcd").is_ok());
        assert!(AccountStore::validate_dev_id(&"a".repeat(16)).is_ok());
        assert!(AccountStore::validate_dev_id(&"a".repeat(17)).is_err());
        assert!(AccountStore::validate_dev_id("").is_err());
    }

    #[test]
    fn test_validate_dev_id_counts_code_points() {
        // 4 code points, 12 bytes
        assert!(AccountStore::validate_dev_id("ключ").is_ok());
        // 16 code points, well over 16 bytes
        assert!(AccountStore::validate_dev_id(&"密".repeat(16)).is_ok());
        assert!(AccountStore::validate_dev_id(&"密".repeat(17)).is_err());
    }

    #[test]
    fn test_account_error_display() {
        assert_eq!(
            AccountError::InvalidDevIdLength.to_string(),
            "Device ID length must be between 4 and 16"
        );
        assert_eq!(
            AccountError::Conflict.to_string(),
            "Device ID already registered"
        );
    }

    #[test]
    fn test_account_error_from_repository_error() {
        let err: AccountError = RepositoryError::DuplicateDevId.into();
        assert!(matches!(err, AccountError::Conflict));

        let err: AccountError = RepositoryError::AccountNotFound.into();
        assert!(matches!(err, AccountError::NotFound));

        let err: AccountError = RepositoryError::Integrity("broken".to_string()).into();
        assert!(matches!(err, AccountError::Internal(_)));
    }

    // ========================================================================
    // Service Tests
    // ========================================================================

    #[tokio::test]
    async fn test_create_dev_account_issues_fresh_ids() {
        let (store, _) = create_test_store();

        let mut seen = std::collections::HashSet::new();
        for dev_id in ["abcd", "player_one", "0123456789abcdef", "ключ"] {
            let id = store.create_dev_account(dev_id).await.unwrap();
            assert!(seen.insert(id), "account id reused: {}", id);
        }
    }

    #[tokio::test]
    async fn test_create_dev_account_rejects_boundary_lengths() {
        let (store, graph) = create_test_store();

        for dev_id in ["abc".to_string(), "a".repeat(17)] {
            let result = store.create_dev_account(&dev_id).await;
            assert!(matches!(result, Err(AccountError::InvalidDevIdLength)));
        }

        assert_eq!(graph.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_creates() {
        let (store, graph) = create_test_store();

        let (a, b) = tokio::join!(
            store.create_dev_account("dup_id"),
            store.create_dev_account("dup_id"),
        );

        let outcomes = [a, b];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(AccountError::Conflict)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(graph.counts().await, (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_creates_across_tasks() {
        let (store, graph) = create_test_store();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_dev_account("dup_id").await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, AccountError::Conflict)),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(graph.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn test_lookup_by_external_id() {
        let (store, _) = create_test_store();
        let account_id = store.create_dev_account("alice123").await.unwrap();

        let found = store.lookup_by_external_id("alice123").await.unwrap();
        assert_eq!(
            found,
            DevLookup {
                found: true,
                account_id
            }
        );

        let missing = store.lookup_by_external_id("bob45678").await.unwrap();
        assert!(!missing.found);
        assert_eq!(missing.account_id, AccountId(0));
    }

    #[tokio::test]
    async fn test_get_privilege() {
        let (store, _) = create_test_store();
        let account_id = store.create_dev_account("priv_user").await.unwrap();

        assert_eq!(store.get_privilege(account_id).await.unwrap(), "Player");
        assert!(matches!(
            store.get_privilege(AccountId(1)).await,
            Err(AccountError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_stalled_storage_hits_deadline() {
        let ids = Arc::new(IdGenerator::new(1).unwrap());
        let store = AccountStore::new(Arc::new(StalledRepository), ids)
            .deadline(Duration::from_millis(20));

        let result = store.create_dev_account("slowpoke").await;
        assert!(matches!(result, Err(AccountError::Internal(_))));

        let result = store.lookup_by_external_id("slowpoke").await;
        assert!(matches!(result, Err(AccountError::Internal(_))));
    }
}
