//! HTTP surface: every route of the lobby on one router

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::accounts::account_api_router;
use crate::core::characters::character_api_router;
use crate::core::context::AppContext;

/// Build the application router
pub fn app_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .merge(account_api_router(ctx.clone()))
        .merge(character_api_router(ctx))
        .layer(TraceLayer::new_for_http())
}

/// GET /ping
async fn ping_handler() -> &'static str {
    "pong"
}
