//! Binary frame format.
//!
//! Every request and response travels as one frame:
//!
//! ```text
//! +-------------+-------------------+
//! | payload_len | payload           |
//! | 4 bytes BE  | payload_len bytes |
//! +-------------+-------------------+
//! ```

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound on buffer growth per read while a payload is arriving.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (an encoded Endpoint record).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        encode_frame(&self.payload, &mut buf, MAX_FRAME_SIZE)?;
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if payload_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_FRAME_SIZE,
            });
        }

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self { payload }))
    }
}

/// Appends the length prefix and `payload` to `dst`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut, max: usize) -> Result<(), ProtocolError> {
    if payload.len() > max {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max,
        });
    }

    dst.reserve(FRAME_HEADER_SIZE + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Writes one frame and flushes the writer.
///
/// Prefix and payload go out in a single buffer, so the caller either sees
/// the whole frame written or an error.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    max_frame_size: usize,
) -> Result<(), ProtocolError> {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    encode_frame(payload, &mut buf, max_frame_size)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame payload into `buf`, replacing its contents.
///
/// Returns `Ok(false)` when the stream ends cleanly before the first prefix
/// byte. A stream that ends inside the prefix or the payload is an
/// `IncompleteFrame` error. A declared length above `max_frame_size` is
/// rejected before any payload byte is read. The buffer grows with the bytes
/// actually received, not with the declared length.
pub async fn read_frame_into<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> Result<bool, ProtocolError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(ProtocolError::IncompleteFrame {
                needed: FRAME_HEADER_SIZE - filled,
            });
        }
        filled += n;
    }

    let payload_len = u32::from_be_bytes(header) as usize;
    if payload_len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: payload_len,
            max: max_frame_size,
        });
    }

    buf.clear();
    let mut remaining = payload_len;
    while remaining > 0 {
        buf.reserve(remaining.min(READ_CHUNK_SIZE));
        let n = (&mut *reader)
            .take(remaining as u64)
            .read_buf(buf)
            .await?;
        if n == 0 {
            return Err(ProtocolError::IncompleteFrame { needed: remaining });
        }
        remaining -= n;
    }

    Ok(true)
}

/// Reads one frame into a freshly allocated buffer.
///
/// Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> Result<Option<Frame>, ProtocolError> {
    let mut buf = BytesMut::new();
    if read_frame_into(reader, &mut buf, max_frame_size).await? {
        Ok(Some(Frame::new(buf.freeze())))
    } else {
        Ok(None)
    }
}
