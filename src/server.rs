//! Process-scoped proxy server with an explicit start/stop lifecycle.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::relay::UpstreamClient;

/// A bound, not yet serving, proxy server.
pub struct ProxyServer {
    listener: TcpListener,
    router: Router,
}

impl ProxyServer {
    /// Bind `0.0.0.0:{config.port}` and build the router.
    ///
    /// Port 0 picks a free port; see [`ProxyServer::local_addr`].
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        Self::bind_addr(config, addr).await
    }

    /// Bind an explicit address.
    pub async fn bind_addr(config: &Config, addr: SocketAddr) -> Result<Self> {
        let client = UpstreamClient::new(config)?;
        let router = create_router(AppState::new(client), &config.allowed_origins);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, router })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!("HTTP server listening on {}", addr);
        info!("Relay endpoint: POST /api/gemma, health: GET /health");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(ProxyError::Io)
    }

    /// Serve on a background task.
    pub fn spawn(self) -> Result<RunningServer> {
        let addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.serve_with_shutdown(async move {
            let _ = shutdown_rx.await;
        }));

        Ok(RunningServer {
            addr,
            shutdown_tx,
            task,
        })
    }
}

/// Handle to a server serving on a background task.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl RunningServer {
    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for reaching the server over loopback.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    /// Request graceful shutdown and wait for the server to finish.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ProxyError::Io(std::io::Error::other(e))),
        }
    }
}
