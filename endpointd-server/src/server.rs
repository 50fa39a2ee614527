//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::ConnectionHandler;
use endpointd_store::EndpointStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Largest accepted frame payload in bytes.
    pub max_frame_size: usize,
    /// TLS acceptor requiring client certificates.
    pub tls_acceptor: TlsAcceptor,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, tls_acceptor: TlsAcceptor) -> Self {
        Self {
            bind_addr,
            max_frame_size: endpointd_protocol::MAX_FRAME_SIZE,
            tls_acceptor,
        }
    }

    /// Sets the frame size bound.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    /// Exchanges aborted by a storage backend failure.
    pub store_errors_total: AtomicU64,
}

/// mTLS server for endpoint records.
pub struct Server {
    config: ServerConfig,
    handler: Arc<ConnectionHandler>,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    ready: watch::Sender<Option<SocketAddr>>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server serving records from `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn EndpointStore>) -> Self {
        let handler = ConnectionHandler::new(store, config.max_frame_size);
        let (shutdown, _) = watch::channel(false);
        let (ready, _) = watch::channel(None);
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown,
            ready,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the listener and accepts connections until [`Server::close`].
    ///
    /// Each accepted connection runs in its own task. An accept error stops
    /// the loop and is returned.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        self.ready.send_replace(Some(local_addr));

        tracing::info!(
            "Server listening on {} (mTLS, {} store)",
            local_addr,
            self.handler.store().backend()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        let result = loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => self.spawn_connection(tcp_stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            break Err(ServerError::Io(e));
                        }
                    }
                }
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    tracing::info!("Server shutting down");
                    break Ok(());
                }
            }
        };

        self.running.store(false, Ordering::SeqCst);
        self.ready.send_replace(None);
        result
    }

    fn spawn_connection(&self, tcp_stream: TcpStream, addr: SocketAddr) {
        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let acceptor = self.config.tls_acceptor.clone();
        let handler = self.handler.clone();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            match Self::tls_accept(tcp_stream, &acceptor, addr).await {
                Ok(stream) => {
                    tracing::info!("Client connected: {}", addr);
                    stats.requests_total.fetch_add(1, Ordering::Relaxed);

                    if let Err(e) = handler.handle(stream, addr).await {
                        if e.is_backend() {
                            stats.store_errors_total.fetch_add(1, Ordering::Relaxed);
                        }
                        tracing::debug!("Connection {} error: {}", addr, e);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::info!("Client disconnected: {}", addr);
                }
                Err(e) => {
                    tracing::warn!("[{}] {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
        });
    }

    async fn tls_accept(
        tcp_stream: TcpStream,
        acceptor: &TlsAcceptor,
        addr: SocketAddr,
    ) -> Result<TlsStream<TcpStream>, ServerError> {
        tracing::debug!("[{}] Performing TLS handshake", addr);
        let stream = acceptor
            .accept(tcp_stream)
            .await
            .map_err(|e| ServerError::TlsHandshake(e.to_string()))?;
        tracing::debug!("[{}] TLS handshake complete", addr);
        Ok(stream)
    }

    /// Waits until the listener is bound and returns its address.
    ///
    /// Resolves to `None` if the server is dropped first.
    pub async fn wait_ready(&self) -> Option<SocketAddr> {
        let mut ready_rx = self.ready.subscribe();
        let addr = ready_rx.wait_for(Option::is_some).await.ok().and_then(|a| *a);
        addr
    }

    /// Returns the bound address while the server is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.ready.borrow()
    }

    /// Stops accepting connections and closes the record store.
    ///
    /// Connections already accepted keep running until their exchange ends.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        self.handler.store().close().await;
        tracing::info!("Server closed");
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Returns the connection handler.
    pub fn handler(&self) -> &ConnectionHandler {
        &self.handler
    }
}
