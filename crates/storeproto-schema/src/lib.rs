//! Version-gated message schemas for storeproto.
//!
//! A message type declares its fields once, as data: tagged fields and
//! predicate-guarded groups. One walk over that declaration encodes,
//! decodes or inspects the message, so version checks live in the schema
//! and not in the code that handles messages.
//!
//! - [`VersionRecord`]: per-family capability vector, clamped when newer
//! - [`Context`]: negotiated records of one connection
//! - [`TypeRegistry`]: (family, message) dispatch, populated through
//!   [`configure_protocol`]

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod reflect;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod value;
pub mod version;

pub use config::RegistryConfig;
pub use context::Context;
pub use error::{check_structural, Result, SchemaError};
pub use message::{
    decode, decode_into, encode, AnyMessage, Envelope, Message, Record, FORMAT_VERSION_TAG,
};
pub use reflect::{walk, Decoder, Direction, Encoder, Reflector, TagInfo, TagInspector};
pub use registry::{
    configure_protocol, DecodeFn, ProtocolFamily, Registrar, Registration, TypeRegistry,
};
pub use schema::{Entry, Field, FieldMeta, Group, Schema, DEFAULT_CHUNK_SIZE};
pub use stream::{ProgressFn, StreamField, StreamProgress};
pub use value::WireValue;
pub use version::{clamp_after_decode, VersionRecord, UNSUPPORTED};

pub use storeproto_wire::{MessageKey, WireReader, WireType, WireWriter};
