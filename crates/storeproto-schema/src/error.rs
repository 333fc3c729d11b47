use storeproto_wire::{FamilyId, MessageId, MessageKey, WireError};

/// Errors that can occur while walking, encoding, decoding or dispatching messages.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A field-level codec failure (bounds, truncation, wire type, ...).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// No type is registered for the (family, message) pair.
    #[error("unknown message {family}:{message}")]
    UnknownMessage { family: FamilyId, message: MessageId },

    /// The reserved keepalive key was used where a message was expected.
    #[error("key 0:0 is reserved for keepalive and carries no message")]
    NullMessage,

    /// A key was registered twice.
    #[error("message key {key} already registered to {existing}")]
    DuplicateRegistration {
        key: MessageKey,
        existing: &'static str,
    },

    /// A type was registered under two keys.
    #[error("type {0} is already registered")]
    TypeAlreadyRegistered(&'static str),

    /// A type was used for sending but never registered.
    #[error("type {0} is not registered")]
    Unregistered(&'static str),

    /// A nested record carries a structural version other than the compiled-in one.
    #[error("{record}: structural version mismatch (expected {expected}, found {found})")]
    StructuralVersion {
        record: &'static str,
        expected: u32,
        found: u32,
    },

    /// The encoded body exceeds the registry's configured limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A decoded message failed a semantic check.
    #[error("{record}: {reason}")]
    Invalid {
        record: &'static str,
        reason: String,
    },
}

impl SchemaError {
    /// Returns true when a field exceeded its declared bound.
    pub fn is_bound_exceeded(&self) -> bool {
        matches!(self, SchemaError::Wire(WireError::BoundExceeded { .. }))
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Fail with `StructuralVersion` unless `found` equals `expected`.
pub fn check_structural(record: &'static str, expected: u32, found: u32) -> Result<()> {
    if expected != found {
        tracing::error!(record, expected, found, "structural version mismatch");
        return Err(SchemaError::StructuralVersion {
            record,
            expected,
            found,
        });
    }
    Ok(())
}
