//! Family and message identifiers.
//!
//! The pair (family, message) is the on-wire discriminant of every frame.
//! Family ids are stable per protocol; message ids are append-only within a
//! family and are never renumbered.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Numeric protocol family identifier.
pub type FamilyId = u8;

/// Numeric message identifier, scoped to a family.
pub type MessageId = u16;

/// Session setup, authentication and generic responses.
pub const CORE: FamilyId = 0;

/// Account management.
pub const AUTH: FamilyId = 1;

/// Applications, builds, media and storage.
pub const MAIN: FamilyId = 2;

/// Routing discriminant of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MessageKey {
    pub family: FamilyId,
    pub message: MessageId,
}

impl MessageKey {
    /// Null/keepalive key. Never dispatched to application logic.
    pub const NULL: MessageKey = MessageKey::new(0, 0);

    pub const fn new(family: FamilyId, message: MessageId) -> Self {
        Self { family, message }
    }

    /// Returns true for the reserved keepalive key.
    pub const fn is_null(&self) -> bool {
        self.family == 0 && self.message == 0
    }

    /// XOR-shift combination used for in-memory lookup.
    pub const fn combined(&self) -> u64 {
        (self.family as u64) ^ ((self.message as u64) << 8)
    }
}

impl Hash for MessageKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.combined());
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.message)
    }
}

impl From<(FamilyId, MessageId)> for MessageKey {
    fn from((family, message): (FamilyId, MessageId)) -> Self {
        Self::new(family, message)
    }
}

/// Returns a human-readable name for a built-in family id.
pub fn family_name(id: FamilyId) -> &'static str {
    match id {
        CORE => "core",
        AUTH => "auth",
        MAIN => "main",
        _ => "unknown",
    }
}
