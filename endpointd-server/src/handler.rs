//! Per-connection request handling.
//!
//! A connection carries exactly one exchange: the client sends one request
//! frame, the server answers with zero or more response frames and closes.
//!
//! ```text
//! AwaitingRequest -> Decoding -> Dispatching -> Encoding -> Closed
//!        |              |             |
//!        +--------------+-------------+--------------------> Closed
//! ```
//!
//! Framing errors, unknown actions and storage errors all close the
//! connection without a response frame.

use crate::error::ServerError;
use crate::pool::Pool;
use bytes::BytesMut;
use endpointd_protocol::{read_frame_into, write_frame, Action, EndpointBuilder, EndpointView};
use endpointd_store::EndpointStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Stage of a connection's single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the request frame.
    AwaitingRequest,
    /// Reading fields out of the request payload.
    Decoding,
    /// Waiting on the record store.
    Dispatching,
    /// Writing response frames.
    Encoding,
    /// Stream shut down.
    Closed,
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandlerOutcome {
    /// Decoded action, `None` for an unknown action code.
    pub action: Option<Action>,
    /// Response frames fully written.
    pub frames_written: usize,
    /// Response frames that failed to write.
    pub frames_failed: usize,
}

/// Runs the request/response exchange on accepted connections.
pub struct ConnectionHandler {
    store: Arc<dyn EndpointStore>,
    builders: Pool<EndpointBuilder>,
    buffers: Pool<BytesMut>,
    max_frame_size: usize,
}

impl ConnectionHandler {
    /// Creates a handler with fresh builder and buffer pools.
    pub fn new(store: Arc<dyn EndpointStore>, max_frame_size: usize) -> Self {
        Self {
            store,
            builders: Pool::builders(),
            buffers: Pool::buffers(),
            max_frame_size,
        }
    }

    /// Returns the builder pool.
    pub fn builders(&self) -> &Pool<EndpointBuilder> {
        &self.builders
    }

    /// Returns the read buffer pool.
    pub fn buffers(&self) -> &Pool<BytesMut> {
        &self.buffers
    }

    /// Returns the record store.
    pub fn store(&self) -> &Arc<dyn EndpointStore> {
        &self.store
    }

    /// Runs one exchange on `stream` and shuts it down.
    ///
    /// Returns an error when no response could be produced: the client hung
    /// up, sent a malformed frame, or the store failed. A response frame
    /// that fails to write is counted in the outcome, not returned.
    pub async fn handle<S>(
        &self,
        mut stream: S,
        peer: SocketAddr,
    ) -> Result<HandlerOutcome, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.exchange(&mut stream, peer).await;

        if let Err(e) = stream.shutdown().await {
            tracing::debug!("[{}] Shutdown error: {}", peer, e);
        }
        tracing::trace!("[{}] {:?}", peer, ConnectionState::Closed);

        result
    }

    async fn exchange<S>(
        &self,
        stream: &mut S,
        peer: SocketAddr,
    ) -> Result<HandlerOutcome, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::trace!("[{}] {:?}", peer, ConnectionState::AwaitingRequest);
        let mut buf = self.buffers.acquire();
        match read_frame_into(stream, &mut buf, self.max_frame_size).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("[{}] Connection closed by client", peer);
                return Err(ServerError::ConnectionClosed);
            }
            Err(e) if e.is_truncated() => {
                tracing::debug!("[{}] Client closed mid-request: {}", peer, e);
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!("[{}] Failed to read request: {}", peer, e);
                return Err(e.into());
            }
        }

        tracing::trace!("[{}] {:?}", peer, ConnectionState::Decoding);
        let request = match EndpointView::new(&buf) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(
                    "[{}] Undecodable request, treating as {}: {}",
                    peer,
                    Action::Index,
                    e
                );
                EndpointView::default()
            }
        };
        let action = match request.action() {
            Some(action) => action,
            None => {
                tracing::warn!(
                    "[{}] Unknown action {}, closing without response",
                    peer,
                    request.action_code()
                );
                return Ok(HandlerOutcome::default());
            }
        };
        tracing::info!("[{}] Request: {} ({} bytes)", peer, action, buf.len());

        tracing::trace!("[{}] {:?}", peer, ConnectionState::Dispatching);
        let result = match action {
            Action::Index => self.store.list_all().await,
            Action::Read => self
                .store
                .fetch_by_id(request.id())
                .await
                .map(|endpoint| vec![endpoint]),
            Action::New => self
                .store
                .create(request.organization_id(), request.url())
                .await
                .map(|endpoint| vec![endpoint]),
        };
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("[{}] {} failed: {}", peer, action, e);
                return Err(e.into());
            }
        };

        tracing::trace!("[{}] {:?}", peer, ConnectionState::Encoding);
        let mut builder = self.builders.acquire();
        let mut outcome = HandlerOutcome {
            action: Some(action),
            ..HandlerOutcome::default()
        };
        for record in &records {
            let payload = builder.encode(record);
            match write_frame(stream, payload, self.max_frame_size).await {
                Ok(()) => outcome.frames_written += 1,
                Err(e) => {
                    tracing::warn!("[{}] Failed to write {} response: {}", peer, action, e);
                    outcome.frames_failed += 1;
                }
            }
        }

        tracing::debug!(
            "[{}] {} complete: {} frames written, {} failed",
            peer,
            action,
            outcome.frames_written,
            outcome.frames_failed
        );
        Ok(outcome)
    }
}
