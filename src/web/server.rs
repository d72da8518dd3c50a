//! Web server for Yak.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::chat::Heartbeat;
use crate::config::{Config, WebConfig};
use crate::{Result, YakError};

use super::handlers::AppState;
use super::router::{create_health_router, create_router, create_static_router};

/// HTTP server for the relay.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Web configuration.
    web_config: WebConfig,
    /// Heartbeat interval (zero disables the heartbeat).
    heartbeat_interval: Duration,
}

impl WebServer {
    /// Create a new web server from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let app_state = AppState::from_config(config)?;
        Self::from_state(config, app_state)
    }

    /// Create a web server around existing state.
    pub fn from_state(config: &Config, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .map_err(|e| {
                YakError::Config(format!(
                    "invalid web server address {}:{}: {e}",
                    config.web.host, config.web.port
                ))
            })?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            web_config: config.web.clone(),
            heartbeat_interval: Duration::from_millis(config.relay.heartbeat_interval_ms),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the shared application state.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.app_state)
    }

    fn build_router(&self) -> Router {
        let mut router = create_router(Arc::clone(&self.app_state), &self.web_config.cors_origins)
            .merge(create_health_router());

        if self.web_config.serve_static {
            if let Some(static_router) = create_static_router(&self.web_config.static_path) {
                router = router.merge(static_router);
            }
        }

        router
    }

    fn start_heartbeat(&self) -> Option<JoinHandle<()>> {
        if self.heartbeat_interval.is_zero() {
            tracing::info!("Heartbeat disabled");
            return None;
        }
        Some(
            Heartbeat::with_interval(self.app_state.broadcaster.clone(), self.heartbeat_interval)
                .spawn(),
        )
    }

    /// Run the web server until Ctrl-C.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // Start heartbeat after successful bind
        let heartbeat = self.start_heartbeat();

        tracing::info!("Web server listening on http://{}", local_addr);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(handle) = heartbeat {
            handle.abort();
        }
        tracing::info!("Web server stopped");
        result
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.start_heartbeat();

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
