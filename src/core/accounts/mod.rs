//! Dev account provisioning
//!
//! - Account store: validated, transactional account + dev ID creation
//! - REST endpoints under `/account/dev`

pub mod api;
pub mod service;

pub use api::account_api_router;
pub use service::{
    AccountError, AccountStore, DEV_ID_MAX_LENGTH, DEV_ID_MIN_LENGTH, DevLookup,
};
