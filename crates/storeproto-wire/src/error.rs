use crate::field::WireType;

/// Errors that can occur while encoding or decoding fields and frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5350 \"SP\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A value ran past the end of its enclosing buffer.
    #[error("truncated value ({needed} bytes needed, {available} available)")]
    Truncated { needed: u64, available: usize },

    /// A varint was longer than ten bytes or overflowed 64 bits.
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// A field key carried a wire type this codec does not know.
    #[error("unknown wire type {0}")]
    UnknownWireType(u8),

    /// A known tag arrived with a wire type different from its schema.
    #[error("field {tag}: expected {expected:?} wire type, found {found:?}")]
    WireTypeMismatch {
        tag: u32,
        expected: WireType,
        found: WireType,
    },

    /// A length prefix or element count is larger than the field bound.
    #[error("field {tag}: size {size} exceeds bound {max}")]
    BoundExceeded { tag: u32, size: u64, max: u64 },

    /// The same tag occurred twice in one message body.
    #[error("field {0}: duplicate tag in message body")]
    DuplicateTag(u32),

    /// A value decoded structurally but is not valid for its type.
    #[error("field {tag}: invalid value: {reason}")]
    InvalidValue { tag: u32, reason: String },

    /// A stream ended before delivering the size it declared.
    #[error("field {tag}: stream incomplete ({received} of {declared} bytes)")]
    StreamIncomplete {
        tag: u32,
        received: u64,
        declared: u64,
    },

    /// A tag does not fit in the field key.
    #[error("tag {0} out of range (max {max})", max = crate::field::MAX_TAG)]
    TagOutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, WireError>;
