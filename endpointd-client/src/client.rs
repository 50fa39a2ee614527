//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::tls::create_tls_connector;
use endpointd_protocol::Endpoint;
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

/// High-level client for endpointd.
///
/// Every call opens a fresh connection, so a `Client` can be shared across
/// tasks and calls run concurrently.
pub struct Client {
    config: ConnectionConfig,
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl Client {
    /// Creates a new client, loading the TLS identity from `config.tls`.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        let host = config.addr.ip().to_string();
        let (connector, server_name) = create_tls_connector(&config.tls, &host)?;
        Ok(Self {
            config,
            connector,
            server_name,
        })
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Opens a new connection to the server.
    pub async fn connect(&self) -> Result<Connection, ClientError> {
        Connection::open(&self.config, &self.connector, self.server_name.clone()).await
    }

    /// Sends `request` on a new connection and returns every response record.
    pub async fn request(&self, request: &Endpoint) -> Result<Vec<Endpoint>, ClientError> {
        self.connect().await?.exchange(request).await
    }

    /// Lists every stored endpoint.
    pub async fn index(&self) -> Result<Vec<Endpoint>, ClientError> {
        self.request(&Endpoint::index_request()).await
    }

    /// Fetches one endpoint by id.
    pub async fn read(&self, id: &str) -> Result<Endpoint, ClientError> {
        let endpoint = self.single(&Endpoint::read_request(id)).await?;
        if endpoint.is_not_found() {
            return Err(ClientError::NotFound(endpoint.id));
        }
        if endpoint.is_error() {
            return Err(ClientError::ServerError(endpoint.error));
        }
        Ok(endpoint)
    }

    /// Creates an endpoint and returns it with its assigned id.
    pub async fn create(&self, organization_id: &str, url: &str) -> Result<Endpoint, ClientError> {
        let endpoint = self
            .single(&Endpoint::new_request(organization_id, url))
            .await?;
        if endpoint.is_error() {
            return Err(ClientError::ServerError(endpoint.error));
        }
        Ok(endpoint)
    }

    async fn single(&self, request: &Endpoint) -> Result<Endpoint, ClientError> {
        self.request(request)
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::NoResponse)
    }
}
