use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::key::MessageKey;

/// Frame header: magic (2) + length (4) + family (1) + message (2) + request id (8).
pub const HEADER_SIZE: usize = 17;

/// Magic bytes: "SP" (0x53 0x50).
pub const MAGIC: [u8; 2] = [0x53, 0x50];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A framed message addressed by (family, message).
#[derive(Debug, Clone)]
pub struct Frame {
    /// Routing discriminant.
    pub key: MessageKey,
    /// Correlates a response with its request. Zero when unused.
    pub request_id: u64,
    /// The encoded message body.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(key: MessageKey, request_id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            key,
            request_id,
            payload: payload.into(),
        }
    }

    /// An empty frame on the null key.
    pub fn keepalive() -> Self {
        Self::new(MessageKey::NULL, 0, Bytes::new())
    }

    pub fn is_keepalive(&self) -> bool {
        self.key.is_null()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// ```text
/// ┌───────────┬──────────┬────────┬──────────┬────────────┬──────────┐
/// │ Magic 2B  │ Length   │ Family │ Message  │ Request id │ Payload  │
/// │ "SP"      │ (4B LE)  │ (1B)   │ (2B LE)  │ (8B LE)    │          │
/// └───────────┴──────────┴────────┴──────────┴────────────┴──────────┘
/// ```
pub fn encode_frame(
    key: MessageKey,
    request_id: u64,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(WireError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u8(key.family);
    dst.put_u16_le(key.message);
    dst.put_u64_le(request_id);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(WireError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let family = header.get_u8();
    let message = header.get_u16_le();
    let request_id = header.get_u64_le();

    if payload_len > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        key: MessageKey::new(family, message),
        request_id,
        payload,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout applied by callers that own a socket.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout applied by callers that own a socket.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
