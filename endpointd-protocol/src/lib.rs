//! # endpointd-protocol
//!
//! Wire protocol implementation for endpointd.
//!
//! This crate provides:
//! - Binary framing with a 4-byte big-endian length prefix
//! - The `Endpoint` record as a FlatBuffers table, with a reusable builder
//!   and a verified zero-copy view
//! - Protocol errors and constants

pub mod error;
pub mod frame;
pub mod message;

pub use error::ProtocolError;
pub use frame::{read_frame, read_frame_into, write_frame, Frame, FRAME_HEADER_SIZE};
pub use message::{Action, Endpoint, EndpointBuilder, EndpointView, NOT_FOUND};

/// Default port for the endpointd server.
pub const DEFAULT_PORT: u16 = 13800;

/// Default maximum frame payload size (16 MiB).
///
/// The length prefix itself allows up to 4 GiB; this bound keeps a single
/// hostile prefix from allocating that much.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
