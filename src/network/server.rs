//! HTTP Bridge Server
//!
//! Async HTTP/1.1 server for the producer and consumer clients.
//! Accepts connections, hands each one to hyper, and routes requests
//! through a shared [`Router`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::network::config::ServerConfig;
use crate::network::router::Router;
use crate::relay::store::PositionStore;

/// Bridge server errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// The bridge server.
pub struct BridgeServer {
    /// Server configuration.
    config: ServerConfig,
    /// Latest-position store shared by all connections.
    store: Arc<PositionStore>,
    /// Request router.
    router: Router,
    /// Shutdown flag. Latches, so a signal sent before `serve` still counts.
    shutdown_tx: watch::Sender<bool>,
}

impl BridgeServer {
    /// Create a new server with a fresh store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(PositionStore::new()))
    }

    /// Create a server around an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<PositionStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let router = Router::new(store.clone(), &config);

        Self {
            config,
            store,
            router,
            shutdown_tx,
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<PositionStore> {
        &self.store
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), BridgeServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// Returns once the accept loop has stopped and every open connection
    /// has finished its in-flight request.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BridgeServerError> {
        let local_addr = listener.local_addr()?;
        info!("Bridge listening on http://{}", local_addr);

        let shutdown = wait_for_shutdown(self.shutdown_tx.subscribe());
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, &mut connections);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(listener);
        if !connections.is_empty() {
            info!("Draining {} open connection(s)", connections.len());
        }
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                error!("Connection task failed: {}", e);
            }
        }

        info!("All connections closed");
        Ok(())
    }

    /// Serve one connection on a tracked task.
    fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        connections: &mut JoinSet<()>,
    ) {
        let router = self.router.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        connections.spawn(async move {
            let service = service_fn(move |req| {
                let router = router.clone();
                async move { Ok::<_, Infallible>(router.handle(req).await) }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            let mut conn = std::pin::pin!(conn);

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        debug!("Connection error for {}: {}", addr, e);
                    }
                }
                _ = wait_for_shutdown(shutdown_rx) => {
                    // Finish the in-flight request, then close
                    conn.as_mut().graceful_shutdown();
                    if let Err(e) = conn.await {
                        debug!("Connection error during shutdown for {}: {}", addr, e);
                    }
                }
            }

            debug!("Client {} disconnected", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Resolve once the shutdown flag is set or the server is dropped.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
