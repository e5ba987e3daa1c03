//! Authentication module
//!
//! - Token service: HS256 bearer tokens bound to an account id
//! - Middleware: gate that turns a bearer token into an [`Identity`]

pub mod jwt;
pub mod middleware;

pub use jwt::{
    AuthError, Claims, DEFAULT_TOKEN_TTL_HOURS, Identity, MAX_TOKEN_TTL_HOURS, TokenConfig,
    TokenService, decode_identity,
};
pub use middleware::auth_middleware;
