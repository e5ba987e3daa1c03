//! Character service
//!
//! Characters belong to the account named by the caller's verified identity;
//! nothing here trusts an account id taken from a request body.

use std::sync::Arc;
use std::time::Duration;

use crate::core::accounts::service::DEFAULT_STORAGE_DEADLINE;
use crate::core::db::models::{AccountId, Character, NewCharacter, Race};
use crate::core::db::repositories::{CharacterRepository, RepositoryError, with_deadline};
use crate::core::id::{IdError, IdGenerator};

/// Maximum character name length, in Unicode code points
pub const CHARACTER_NAME_MAX_LENGTH: usize = 16;

/// Character service error types
#[derive(Debug, thiserror::Error)]
pub enum CharacterError {
    #[error(
        "Character name length must be between 1 and {max}",
        max = CHARACTER_NAME_MAX_LENGTH
    )]
    InvalidNameLength,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for CharacterError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AccountNotFound => CharacterError::AccountNotFound,
            _ => CharacterError::Internal(err.to_string()),
        }
    }
}

impl From<IdError> for CharacterError {
    fn from(err: IdError) -> Self {
        CharacterError::Internal(err.to_string())
    }
}

/// Character service
#[derive(Clone)]
pub struct CharacterService {
    repo: Arc<dyn CharacterRepository>,
    ids: Arc<IdGenerator>,
    deadline: Duration,
}

impl CharacterService {
    pub fn new(repo: Arc<dyn CharacterRepository>, ids: Arc<IdGenerator>) -> Self {
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

    pub fn validate_name(name: &str) -> Result<(), CharacterError> {
        let length = name.chars().count();
        if length == 0 || length > CHARACTER_NAME_MAX_LENGTH {
            return Err(CharacterError::InvalidNameLength);
        }
        Ok(())
    }

    /// Create a character owned by `account_id`
    pub async fn create_character(
        &self,
        account_id: AccountId,
        name: &str,
        race: Race,
    ) -> Result<Character, CharacterError> {
        Self::validate_name(name)?;

        let character = NewCharacter {
            id: self.ids.next()?,
            account_id,
            name: name.to_string(),
            race,
        };
        let created = with_deadline(self.deadline, self.repo.create_character(&character)).await?;

        tracing::info!(%account_id, character_id = created.id, "Character created");

        Ok(created)
    }

    /// Characters of `account_id`, newest first
    pub async fn list_characters(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, CharacterError> {
        Ok(with_deadline(self.deadline, self.repo.list_characters(account_id)).await?)
    }
}
