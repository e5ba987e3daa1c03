//! Listener: HTTPS when certificate files are configured, plain HTTP otherwise

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::core::config::{Config, TlsFiles};
use crate::core::context::StartupError;

/// Read the PEM certificate chain and private key
pub async fn load_tls(files: &TlsFiles) -> Result<RustlsConfig, StartupError> {
    // ring is the provider sqlx's rustls is built with; a second install is a no-op
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(&files.certificate, &files.private_key)
        .await
        .map_err(StartupError::Tls)
}

/// Serve `app` on the configured address until the listener fails
pub async fn serve(config: &Config, app: Router) -> Result<(), StartupError> {
    match &config.tls {
        Some(files) => {
            let tls = load_tls(files).await?;
            tracing::info!("listening on https://{}", config.lobby_addr);

            axum_server::bind_rustls(config.lobby_addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.lobby_addr).await?;
            tracing::warn!("TLS is not configured; bearer tokens travel in clear text");
            tracing::info!("listening on http://{}", config.lobby_addr);

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn pem_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_tls_missing_files() {
        let files = TlsFiles {
            certificate: PathBuf::from("/nonexistent/spire/lobby.crt"),
            private_key: PathBuf::from("/nonexistent/spire/lobby.key"),
        };

        assert!(matches!(load_tls(&files).await, Err(StartupError::Tls(_))));
    }

    #[tokio::test]
    async fn test_load_tls_rejects_non_pem_contents() {
        let certificate = pem_file("not a certificate");
        let private_key = pem_file("not a key");
        let files = TlsFiles {
            certificate: certificate.path().to_path_buf(),
            private_key: private_key.path().to_path_buf(),
        };

        assert!(matches!(load_tls(&files).await, Err(StartupError::Tls(_))));
    }
}
