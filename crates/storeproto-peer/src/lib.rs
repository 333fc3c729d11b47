//! Peer connections for storeproto.
//!
//! A connection starts with the init exchange: the client advertises its
//! version records in an auth or main `InitRequest`, the server installs
//! them and answers with a core `InitResponse`. Afterwards both sides send
//! typed messages encoded under the agreed records.

pub mod connection;
pub mod error;
pub mod handshake;

#[cfg(unix)]
pub use connection::{accept, connect};
pub use connection::{Connection, ConnectionConfig};
pub use error::{PeerError, Result};
pub use handshake::{
    handshake_client, handshake_server, HandshakeConfig, HandshakeResult, Service,
    INIT_REQUEST_ID,
};
