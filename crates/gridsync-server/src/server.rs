//! Server lifecycle: bind both listeners, serve until shutdown.
//!
//! [`BoundServer`] separates binding from serving so callers (and tests)
//! can bind port `0` and read the chosen addresses before serving.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::{ListenConfig, ServiceConfig};
use crate::router::{build_http_router, build_stream_router};
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

async fn bind(config: &ListenConfig) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Both listeners, bound but not yet serving.
#[derive(Debug)]
pub struct BoundServer {
    http: TcpListener,
    stream: TcpListener,
}

impl BoundServer {
    /// Bind the request/response and streaming listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if either address cannot be bound.
    pub async fn bind(config: &ServiceConfig) -> Result<Self, ServerError> {
        Ok(Self {
            http: bind(&config.http).await?,
            stream: bind(&config.stream).await?,
        })
    }

    /// Local address of the request/response listener.
    pub fn http_addr(&self) -> Result<SocketAddr, ServerError> {
        self.http
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("http listener address: {e}")))
    }

    /// Local address of the streaming listener.
    pub fn stream_addr(&self) -> Result<SocketAddr, ServerError> {
        self.stream
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("stream listener address: {e}")))
    }

    /// Serve both channels until `shutdown` resolves, then drain.
    ///
    /// If either server fails, the other is shut down too and the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] on a fatal I/O error.
    pub async fn serve<F>(self, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let http_addr = self.http_addr()?;
        let stream_addr = self.stream_addr()?;
        let (stop_tx, stop_rx) = watch::channel(false);

        let http = axum::serve(self.http, build_http_router(Arc::clone(&state)))
            .with_graceful_shutdown(stopped(stop_rx.clone()));
        let stream = axum::serve(self.stream, build_stream_router(state))
            .with_graceful_shutdown(stopped(stop_rx));

        info!(%http_addr, "Request/response channel listening");
        info!(%stream_addr, "Streaming channel listening");

        let trigger = tokio::spawn(async move {
            shutdown.await;
            info!("Shutdown requested");
            stop_tx.send_replace(true);
        });

        let trigger = trigger.abort_handle();
        let result = tokio::try_join!(
            async {
                http.await
                    .map_err(|e| ServerError::Serve(format!("http channel: {e}")))
            },
            async {
                stream
                    .await
                    .map_err(|e| ServerError::Serve(format!("stream channel: {e}")))
            },
        );
        trigger.abort();

        result.map(|_| ())
    }
}

/// Resolve once the watch flag flips to `true` or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Bind both listeners from `config` and serve until `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn start_server(config: &ServiceConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    BoundServer::bind(config)
        .await?
        .serve(state, shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
