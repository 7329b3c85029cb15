//! HTTP front end for the region editor and scanner dashboard.
//!
//! This is the only crate in the workspace that pulls in tokio: the rest
//! of the system (harvester, coordinator, worker pool) runs on plain OS
//! threads and mutexes, and this crate bridges into an async runtime
//! purely to host axum.

pub mod bootstrap;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod worker_pool;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use geo_coordinator::Coordinator;
use thiserror::Error;

pub use state::AppState;
pub use worker_pool::WorkerPool;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub login_addr: String,
    pub account_prefix: String,
    pub password: String,
    pub initial_workers: usize,
}

/// A running server on its own OS thread, with its own tokio runtime.
pub struct ServerHandle {
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Blocks until the server thread exits (normally only on process
    /// shutdown or a bind failure).
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the HTTP server on a dedicated thread running its own
/// multi-threaded tokio runtime, and returns immediately.
pub fn spawn_server(coordinator: Arc<Coordinator>, config: ServerConfig) -> ServerHandle {
    let join = std::thread::Builder::new()
        .name("geo-server".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to start geo-server tokio runtime");

            runtime.block_on(async move {
                if let Err(err) = serve(coordinator, config).await {
                    tracing::error!(%err, "geo-server exited with an error");
                }
            });
        })
        .expect("failed to spawn geo-server thread");

    ServerHandle { join: Some(join) }
}

async fn serve(coordinator: Arc<Coordinator>, config: ServerConfig) -> Result<(), ServerError> {
    let state = AppState::new(
        coordinator,
        config.output_dir,
        config.login_addr,
        config.account_prefix,
        config.password,
    );
    if config.initial_workers > 0 {
        state.worker_pool.start(config.initial_workers);
    }
    let router = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        })?;

    tracing::info!(addr = %config.bind_addr, "geo-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
