use storeproto_protocol::ErrorCondition;
use storeproto_schema::SchemaError;
use storeproto_wire::{MessageKey, WireError};

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Wire(#[from] WireError),

    /// Message encode, decode or dispatch error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Handshake failed locally.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer answered with a non-success result code.
    #[error("rejected by peer: {0}")]
    Rejected(ErrorCondition),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A message arrived that the caller did not expect here.
    #[error("expected {expected}, got {found} ({key})")]
    Unexpected {
        expected: &'static str,
        found: &'static str,
        key: MessageKey,
    },

    /// Too many out-of-order responses were buffered while waiting.
    #[error("pending message buffer full ({0} messages)")]
    BufferFull(usize),

    /// Operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PeerError {
    /// Map a frame error on a blocking read to the peer-level condition.
    pub(crate) fn from_read(err: WireError, during: &str) -> Self {
        match err {
            WireError::ConnectionClosed => {
                PeerError::Disconnected(format!("connection closed during {during}"))
            }
            other => PeerError::Wire(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
