//! Characters owned by authenticated accounts

pub mod api;
pub mod service;

pub use api::{CharacterApiError, character_api_router};
pub use service::{CHARACTER_NAME_MAX_LENGTH, CharacterError, CharacterService};
