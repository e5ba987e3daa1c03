use std::sync::Arc;

use spire_lobby::core::config::Config;
use spire_lobby::core::server::serve;
use spire_lobby::core::{AppContext, StartupError, app_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "Lobby failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // Load application config from environment variables
    let config = Config::from_env()?;

    // Log config status (without revealing secrets)
    tracing::info!(
        store = ?config.store,
        tls = config.tls.is_some(),
        node_id = config.node_id,
        dev_mode = config.dev_mode,
        token_ttl_hours = config.token_ttl_hours,
        "Config loaded"
    );

    let ctx = Arc::new(AppContext::from_config(&config).await?);
    let app = app_router(ctx);

    serve(&config, app).await
}
