//! Spire Lobby - account and identity service for the game lobby
//!
//! Provisions accounts, binds device identities to them, and issues the
//! bearer tokens that gate account-scoped routes such as character management.

pub mod core;
