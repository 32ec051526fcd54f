//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::Gateway;
use super::router::{AppState, create_router};
use crate::config::Config;
use crate::{Error, Result};

/// HTTP server around a [`Gateway`]
pub struct Server {
    config: Config,
    gateway: Arc<Gateway>,
}

impl Server {
    /// Build the gateway from configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let gateway = Arc::new(Gateway::from_config(&config).await?);
        Ok(Self { config, gateway })
    }

    /// Wrap an already assembled gateway.
    pub fn with_gateway(config: Config, gateway: Arc<Gateway>) -> Self {
        Self { config, gateway }
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let state = Arc::new(AppState {
            gateway: Arc::clone(&self.gateway),
        });
        let app = create_router(
            state,
            self.config.server.max_body_size,
            self.config.server.request_timeout,
        );

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("INTEGRATION GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(
            providers = self.gateway.registry().len(),
            features = self.gateway.features().len(),
            "Catalog loaded"
        );
        for manifest in self.gateway.registry().manifests() {
            info!(
                "  {} ({}) - {} operations",
                manifest.provider,
                manifest.category.label(),
                manifest.operations.len()
            );
        }
        info!(
            call_timeout = ?self.config.proxy.call_timeout,
            request_timeout = ?self.config.server.request_timeout,
            "Timeouts"
        );
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
