//! Versioned, tag-addressed message protocol for an application store
//! backend.
//!
//! # Crate Structure
//!
//! - [`wire`] : field codec and (family, message) framing
//! - [`schema`] : version-gated message schemas and the type registry
//! - [`protocol`] : the core, auth and main families, domain records and
//!   result codes
//! - [`peer`] : init handshake and typed connections (behind `peer` feature)

/// Re-export wire types.
pub mod wire {
    pub use storeproto_wire::*;
}

/// Re-export schema types.
pub mod schema {
    pub use storeproto_schema::*;
}

/// Re-export protocol families and records.
pub mod protocol {
    pub use storeproto_protocol::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use storeproto_peer::*;
}
