//! Bearer authentication gate
//!
//! `auth_middleware` verifies the `Authorization: Bearer <token>` header and
//! stores the resulting [`Identity`] in the request extensions, where
//! handlers pick it up with the `Identity` extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::core::auth::jwt::{AuthError, Identity, TokenService};
use crate::core::error::ApiError;

/// Convert AuthError to API response
///
/// All credential failures share one body so callers cannot tell them apart.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Internal(detail) => {
                tracing::error!(%detail, "authentication failed: internal error");
                ApiError::new("Internal server error", "INTERNAL_ERROR")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => ApiError::new("Unauthorized", "UNAUTHORIZED").with_status(StatusCode::UNAUTHORIZED),
        }
    }
}

/// Verify the bearer token and attach the caller identity to the request
pub async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
    else {
        tracing::warn!("authentication failed: missing or non-Bearer authorization header");
        return Err(AuthError::MissingCredentials);
    };

    let identity = tokens.verify_token(bearer.token()).map_err(|err| {
        tracing::warn!(reason = %err, "authentication failed: invalid bearer token");
        err
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}
