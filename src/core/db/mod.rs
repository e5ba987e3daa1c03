//! Database module for the lobby
//!
//! This module provides database connectivity, models, and the storage
//! capabilities with their relational and graph backends.

pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used items
pub use models::*;
pub use pool::{DbConfig, DbError, DbTarget, create_pool, create_pool_with_migrations};
pub use repositories::{
    AccountRepository, CharacterRepository, GraphStore, RelationalStore, RepositoryError,
    with_deadline,
};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
