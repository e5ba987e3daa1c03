//! Lobby core: identity, authentication and the account-scoped routes they gate

pub mod accounts;
pub mod auth;
pub mod characters;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod id;
pub mod router;
pub mod server;

pub use context::{AppContext, StartupError};
pub use router::app_router;
