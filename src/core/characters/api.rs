//! Character API endpoints
//!
//! - POST /character/create - Create a character for the caller's account
//! - POST /character/list - List the caller's characters
//!
//! Both routes sit behind the bearer gate.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::auth::{Identity, auth_middleware};
use crate::core::characters::CharacterError;
use crate::core::context::AppContext;
use crate::core::db::models::{Character, Race};
use crate::core::error::ApiError;

/// Convert CharacterError to API response
impl IntoResponse for CharacterError {
    fn into_response(self) -> Response {
        match self {
            CharacterError::InvalidNameLength => ApiError::new(self.to_string(), "INVALID_NAME")
                .with_status(StatusCode::NOT_ACCEPTABLE),
            // The gate vouched for the account, so it vanishing is a server fault
            CharacterError::AccountNotFound | CharacterError::Internal(_) => {
                tracing::error!(error = %self, "character operation failed");
                ApiError::new("Internal server error", "INTERNAL_ERROR")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Errors surfaced by the character handlers
#[derive(Debug, thiserror::Error)]
pub enum CharacterApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Character(#[from] CharacterError),
}

impl From<JsonRejection> for CharacterApiError {
    fn from(rejection: JsonRejection) -> Self {
        CharacterApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for CharacterApiError {
    fn into_response(self) -> Response {
        match self {
            CharacterApiError::BadRequest(message) => {
                ApiError::new(message, "BAD_REQUEST").with_status(StatusCode::BAD_REQUEST)
            }
            CharacterApiError::Character(err) => err.into_response(),
        }
    }
}

/// Request for creating a character
#[derive(Debug, Deserialize)]
pub struct CreateCharacterRequest {
    pub character_name: String,
    pub character_race: Race,
}

#[derive(Debug, Serialize)]
pub struct CharacterResponse {
    pub character: Character,
}

#[derive(Debug, Serialize)]
pub struct CharacterListResponse {
    pub characters: Vec<Character>,
}

/// Create the character API router
pub fn character_api_router(ctx: Arc<AppContext>) -> Router {
    let tokens = ctx.tokens.clone();

    Router::new()
        .route("/character/create", post(create_handler))
        .route("/character/list", post(list_handler))
        .route_layer(from_fn_with_state(tokens, auth_middleware))
        .with_state(ctx)
}

/// POST /character/create
async fn create_handler(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
    payload: Result<Json<CreateCharacterRequest>, JsonRejection>,
) -> Result<Json<CharacterResponse>, CharacterApiError> {
    let Json(request) = payload?;

    let character = ctx
        .characters
        .create_character(
            identity.account_id,
            &request.character_name,
            request.character_race,
        )
        .await?;

    Ok(Json(CharacterResponse { character }))
}

/// POST /character/list
async fn list_handler(
    State(ctx): State<Arc<AppContext>>,
    identity: Identity,
) -> Result<Json<CharacterListResponse>, CharacterError> {
    let characters = ctx.characters.list_characters(identity.account_id).await?;

    Ok(Json(CharacterListResponse { characters }))
}
