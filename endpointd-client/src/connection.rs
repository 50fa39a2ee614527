//! Connection management.
//!
//! The server answers exactly one request per connection and then closes,
//! so a [`Connection`] is opened, used for one exchange and consumed.

use crate::error::ClientError;
use bytes::BytesMut;
use endpointd_protocol::{
    read_frame_into, write_frame, Endpoint, EndpointBuilder, EndpointView, MAX_FRAME_SIZE,
};
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// TLS configuration for client connections.
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    /// Path to PEM-encoded CA certificate(s) for server verification.
    pub ca_cert_path: PathBuf,
    /// Path to PEM-encoded client certificate.
    pub client_cert_path: PathBuf,
    /// Path to PEM-encoded client private key.
    pub client_key_path: PathBuf,
    /// Server name for SNI and verification (defaults to the address IP).
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn new(
        ca_cert_path: impl Into<PathBuf>,
        client_cert_path: impl Into<PathBuf>,
        client_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ca_cert_path: ca_cert_path.into(),
            client_cert_path: client_cert_path.into(),
            client_key_path: client_key_path.into(),
            server_name: None,
        }
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Timeout for TCP connect and TLS handshake.
    pub connect_timeout: Duration,
    /// Timeout for each response frame.
    pub request_timeout: Duration,
    /// Largest accepted response frame.
    pub max_frame_size: usize,
    /// TLS configuration.
    pub tls: TlsClientConfig,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr, tls: TlsClientConfig) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_frame_size: MAX_FRAME_SIZE,
            tls,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

/// An open connection to an endpointd server.
pub struct Connection {
    stream: TlsStream<TcpStream>,
    request_timeout: Duration,
    max_frame_size: usize,
    buf: BytesMut,
}

impl Connection {
    /// Connects and completes the TLS handshake.
    pub async fn open(
        config: &ConnectionConfig,
        connector: &TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = tokio::time::timeout(config.connect_timeout, async {
            let tcp_stream = TcpStream::connect(config.addr).await?;
            tcp_stream.set_nodelay(true).ok();

            tracing::debug!("Performing TLS handshake...");
            connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| ClientError::TlsHandshake(e.to_string()))
        })
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })??;

        tracing::debug!("TLS handshake complete");
        Ok(Self {
            stream,
            request_timeout: config.request_timeout,
            max_frame_size: config.max_frame_size,
            buf: BytesMut::new(),
        })
    }

    /// Sends one request frame.
    pub async fn send(&mut self, request: &Endpoint) -> Result<(), ClientError> {
        let mut builder = EndpointBuilder::new();
        let payload = builder.encode(request);
        tracing::debug!("Sending {} request ({} bytes)", request.action, payload.len());
        write_frame(&mut self.stream, payload, self.max_frame_size).await?;
        Ok(())
    }

    /// Receives the next response frame, or `None` once the server closes.
    pub async fn recv(&mut self) -> Result<Option<Endpoint>, ClientError> {
        let more = tokio::time::timeout(
            self.request_timeout,
            read_frame_into(&mut self.stream, &mut self.buf, self.max_frame_size),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Read timeout");
            ClientError::Timeout
        })??;

        if !more {
            return Ok(None);
        }
        Ok(Some(EndpointView::new(&self.buf)?.to_endpoint()))
    }

    /// Sends `request` and collects every response until the server closes.
    pub async fn exchange(mut self, request: &Endpoint) -> Result<Vec<Endpoint>, ClientError> {
        self.send(request).await?;

        let mut responses = Vec::new();
        while let Some(response) = self.recv().await? {
            responses.push(response);
        }
        tracing::debug!("Received {} responses", responses.len());
        Ok(responses)
    }
}
