//! Tagged field codec and frame layer for storeproto.
//!
//! Two levels live here:
//! - fields: varint keys `(tag << 3) | wire_type`, length-prefixed values with
//!   caller-supplied bounds, and chunked streams
//! - frames: a 17-byte header carrying magic, payload length and the
//!   (family, message, request id) routing triple
//!
//! Nothing in this crate knows about message types or versions.

pub mod codec;
pub mod error;
pub mod field;
pub mod key;
pub mod reader;
pub mod varint;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{Result, WireError};
pub use field::{
    check_bound, index_fields, index_fields_bounded, RawField, StreamReader, WireReader, WireType,
    WireWriter, MAX_TAG, UNDECLARED_STREAM_SIZE,
};
pub use key::{family_name, FamilyId, MessageId, MessageKey, AUTH, CORE, MAIN};
pub use reader::FrameReader;
pub use writer::FrameWriter;
