//! PostgreSQL-backed store

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::db::models::{
    Account, AccountId, Character, DEFAULT_PRIVILEGE, DevAccount, NewCharacter, Platform,
};
use crate::core::db::repositories::{AccountRepository, CharacterRepository, RepositoryError};

/// Relational store for accounts, dev bindings and characters
#[derive(Clone)]
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    /// Create a new relational store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map constraint violations onto the repository's vocabulary
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::DuplicateDevId;
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::AccountNotFound;
        }
    }
    RepositoryError::DatabaseError(err)
}

#[async_trait]
impl AccountRepository for RelationalStore {
    async fn create_dev_account(
        &self,
        account_id: AccountId,
        dev_id: &str,
    ) -> Result<Account, RepositoryError> {
        // Dropping `tx` on any early return rolls both inserts back
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO account (id, platform, platform_id, privilege)
            VALUES ($1, $2, 0, $3)
            RETURNING id, platform, platform_id, privilege, created_at
            "#,
        )
        .bind(account_id)
        .bind(Platform::Dev.as_str())
        .bind(DEFAULT_PRIVILEGE)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match classify(e) {
            RepositoryError::DuplicateDevId => {
                RepositoryError::Integrity(format!("account id {} already exists", account_id))
            }
            other => other,
        })?;

        sqlx::query(
            r#"
            INSERT INTO dev_account (id, account_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(dev_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await?;

        Ok(account)
    }

    async fn find_by_dev_id(&self, dev_id: &str) -> Result<Option<DevAccount>, RepositoryError> {
        let binding = sqlx::query_as::<_, DevAccount>(
            r#"
            SELECT id, account_id, created_at
            FROM dev_account
            WHERE id = $1
            "#,
        )
        .bind(dev_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(binding)
    }

    async fn find_privilege(
        &self,
        account_id: AccountId,
    ) -> Result<Option<String>, RepositoryError> {
        let privilege: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT privilege
            FROM account
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(privilege.map(|(p,)| p))
    }
}

#[async_trait]
impl CharacterRepository for RelationalStore {
    async fn create_character(
        &self,
        character: &NewCharacter,
    ) -> Result<Character, RepositoryError> {
        let created = sqlx::query_as::<_, Character>(
            r#"
            INSERT INTO "character" (id, account_id, name, race)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, name, race, created_at
            "#,
        )
        .bind(character.id)
        .bind(character.account_id)
        .bind(&character.name)
        .bind(character.race.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match classify(e) {
            RepositoryError::DuplicateDevId => {
                RepositoryError::Integrity(format!("character id {} already exists", character.id))
            }
            other => other,
        })?;

        Ok(created)
    }

    async fn list_characters(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, RepositoryError> {
        let characters = sqlx::query_as::<_, Character>(
            r#"
            SELECT id, account_id, name, race, created_at
            FROM "character"
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(characters)
    }
}
