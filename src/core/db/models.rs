//! Database models for the lobby
//!
//! This module defines the entity structs that map to PostgreSQL tables and
//! the graph store's node payloads.

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Error for text columns holding an unknown enum value
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// Account Model
// ============================================================================

/// Internal, permanent account identifier
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(pub i64);

/// Identity provider an account was registered through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Dev,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Dev => "Dev",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Platform {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Dev" => Ok(Platform::Dev),
            _ => Err(UnknownVariant {
                kind: "platform",
                value,
            }),
        }
    }
}

/// Privilege assigned to newly created accounts
pub const DEFAULT_PRIVILEGE: &str = "Player";

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    #[sqlx(try_from = "String")]
    pub platform: Platform,
    pub platform_id: i64,
    pub privilege: String,
    pub created_at: DateTime<Utc>,
}

/// Binding of a dev ID to its account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DevAccount {
    #[sqlx(rename = "id")]
    pub dev_id: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Character Model
// ============================================================================

/// Playable race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Race {
    Human,
    Barbarian,
    Elf,
}

impl Race {
    pub fn as_str(&self) -> &'static str {
        match self {
            Race::Human => "Human",
            Race::Barbarian => "Barbarian",
            Race::Elf => "Elf",
        }
    }
}

impl TryFrom<String> for Race {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Human" => Ok(Race::Human),
            "Barbarian" => Ok(Race::Barbarian),
            "Elf" => Ok(Race::Elf),
            _ => Err(UnknownVariant { kind: "race", value }),
        }
    }
}

/// Character entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Character {
    pub id: i64,
    #[serde(skip_serializing)]
    pub account_id: AccountId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub race: Race,
    pub created_at: DateTime<Utc>,
}

/// Character data for creation
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub id: i64,
    pub account_id: AccountId,
    pub name: String,
    pub race: Race,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_serializes_as_number() {
        let json = serde_json::to_string(&AccountId(42)).unwrap();
        assert_eq!(json, "42");

        let id: AccountId = serde_json::from_str("7").unwrap();
        assert_eq!(id, AccountId(7));
        assert_eq!(AccountId::default(), AccountId(0));
        assert_eq!(AccountId(99).to_string(), "99");
    }

    #[test]
    fn test_platform_round_trip_through_text() {
        let platform = Platform::try_from(Platform::Dev.as_str().to_string()).unwrap();
        assert_eq!(platform, Platform::Dev);

        let err = Platform::try_from("Steam".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown platform value: Steam");
    }

    #[test]
    fn test_race_parsing() {
        assert_eq!(Race::try_from("Elf".to_string()).unwrap(), Race::Elf);
        assert!(Race::try_from("elf".to_string()).is_err());

        let race: Race = serde_json::from_str(r#""Barbarian""#).unwrap();
        assert_eq!(race, Race::Barbarian);
    }

    #[test]
    fn test_character_serialization_hides_account() {
        let character = Character {
            id: 12,
            account_id: AccountId(5),
            name: "Aria".to_string(),
            race: Race::Human,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&character).unwrap();
        assert_eq!(json["id"], 12);
        assert_eq!(json["name"], "Aria");
        assert_eq!(json["race"], "Human");
        assert!(json.get("account_id").is_none());
    }
}
