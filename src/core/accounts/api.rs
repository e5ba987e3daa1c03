//! Dev account API endpoints
//!
//! Provides REST API endpoints for development accounts:
//! - POST /account/dev/create - Register a dev ID and get a new account id
//! - POST /account/dev/me - Look up the account bound to a dev ID
//! - POST /account/dev/token - Exchange an account id for a bearer token
//!
//! The whole router answers `503 Service Unavailable` unless dev mode is on.

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::accounts::{AccountError, DevLookup};
use crate::core::auth::AuthError;
use crate::core::context::AppContext;
use crate::core::db::models::AccountId;
use crate::core::error::ApiError;

/// Convert AccountError to API response
impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AccountError::InvalidDevIdLength => (StatusCode::NOT_ACCEPTABLE, "INVALID_DEV_ID"),
            AccountError::Conflict => (StatusCode::CONFLICT, "DEV_ID_EXISTS"),
            AccountError::NotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            AccountError::Internal(detail) => {
                tracing::error!(%detail, "account operation failed");
                return ApiError::new("Internal server error", "INTERNAL_ERROR")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        ApiError::new(self.to_string(), code).with_status(status)
    }
}

/// Errors surfaced by the dev account handlers
#[derive(Debug, thiserror::Error)]
pub enum DevApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<JsonRejection> for DevApiError {
    fn from(rejection: JsonRejection) -> Self {
        DevApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for DevApiError {
    fn into_response(self) -> Response {
        match self {
            DevApiError::BadRequest(message) => {
                ApiError::new(message, "BAD_REQUEST").with_status(StatusCode::BAD_REQUEST)
            }
            DevApiError::Account(err) => err.into_response(),
            DevApiError::Auth(err) => err.into_response(),
        }
    }
}

/// Request for creating a dev account
#[derive(Debug, Deserialize)]
pub struct CreateDevAccountRequest {
    pub dev_id: String,
}

/// Response carrying a freshly created account id
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDevAccountResponse {
    pub account_id: AccountId,
}

/// Request for looking up a dev ID
#[derive(Debug, Deserialize)]
pub struct DevMeRequest {
    pub dev_id: String,
}

/// Request for a token
#[derive(Debug, Deserialize)]
pub struct DevTokenRequest {
    pub account_id: AccountId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DevTokenResponse {
    pub token: String,
}

/// Create the dev account API router
pub fn account_api_router(ctx: Arc<AppContext>) -> Router {
    let dev_mode = ctx.dev_mode;

    Router::new()
        .route("/account/dev/create", post(create_handler))
        .route("/account/dev/me", post(me_handler))
        .route("/account/dev/token", post(token_handler))
        .route_layer(from_fn_with_state(dev_mode, dev_mode_guard))
        .with_state(ctx)
}

/// Refuse every dev route while dev mode is off
async fn dev_mode_guard(State(enabled): State<bool>, request: Request, next: Next) -> Response {
    if !enabled {
        return ApiError::new("Dev mode is disabled", "DEV_MODE_DISABLED")
            .with_status(StatusCode::SERVICE_UNAVAILABLE);
    }
    next.run(request).await
}

/// POST /account/dev/create
async fn create_handler(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<CreateDevAccountRequest>, JsonRejection>,
) -> Result<Json<CreateDevAccountResponse>, DevApiError> {
    let Json(request) = payload?;

    let account_id = ctx.accounts.create_dev_account(&request.dev_id).await?;

    Ok(Json(CreateDevAccountResponse { account_id }))
}

/// POST /account/dev/me
async fn me_handler(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<DevMeRequest>, JsonRejection>,
) -> Result<Json<DevLookup>, DevApiError> {
    let Json(request) = payload?;

    Ok(Json(ctx.accounts.lookup_by_external_id(&request.dev_id).await?))
}

/// POST /account/dev/token
async fn token_handler(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<DevTokenRequest>, JsonRejection>,
) -> Result<Json<DevTokenResponse>, DevApiError> {
    let Json(request) = payload?;

    let token = ctx.tokens.issue_token(request.account_id).await?;

    Ok(Json(DevTokenResponse { token }))
}
