use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::task::JoinHandle;

use super::handlers::DemoService;
use super::routes::api_routes;
use crate::configuration::ServerConfig;
use crate::error_handling::types::WebError;
use crate::session_management::SessionManager;
use crate::storage::{MemoryStorage, Storage};

/// Demo REST server
pub struct WebServer {
    config: ServerConfig,
    service: Arc<DemoService>,
}

impl WebServer {
    /// Create a new WebServer instance with empty in-memory state
    pub fn new(config: ServerConfig) -> Self {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let sessions = Arc::new(SessionManager::new(config.session_timeout()));
        let service = Arc::new(DemoService::new(
            storage,
            sessions,
            config.large_dataset_size,
        ));
        Self { config, service }
    }

    pub fn service(&self) -> Arc<DemoService> {
        self.service.clone()
    }

    /// Serve until ctrl-c is received.
    pub async fn start(&self) -> Result<(), WebError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| WebError::BindFailed(e.to_string()))?;
        self.start_with_shutdown(addr, shutdown_signal()).await
    }

    /// Serve on `addr` until `shutdown` resolves.
    pub async fn start_with_shutdown(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WebError> {
        let routes = api_routes(self.service.clone(), self.config.max_body_bytes);
        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        let reaper = spawn_session_reaper(self.service.sessions(), self.config.cleanup_interval());

        info!(
            "Listening on http://{} (session lifetime {}s)",
            bound, self.config.session_timeout_secs
        );
        server.await;

        reaper.abort();
        info!("Server stopped");
        Ok(())
    }
}

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically evicts sessions older than their lifetime.
///
/// Intervals shorter than one second are raised to one second.
fn spawn_session_reaper(sessions: Arc<SessionManager>, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_CLEANUP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = sessions.cleanup_expired_sessions() {
                error!("Session cleanup failed: {}", e);
            }
        }
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Unable to listen for shutdown signal: {}", e),
    }
}
