//! Tag-addressed field encoding.
//!
//! Every field is written as a varint key `(tag << 3) | wire_type` followed by
//! its value. The wire type alone is enough to skip a value, which is what
//! lets an older reader step over tags it has never heard of.
//!
//! ```text
//! Varint  key | varint
//! Len     key | varint length | bytes
//! Stream  key | varint declared size | (varint n | n bytes)* | 0
//! ```

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::varint::{get_varint, put_varint};

/// Largest tag representable in a field key.
pub const MAX_TAG: u32 = u32::MAX >> 3;

/// Declared size written for streams whose length is not known up front.
pub const UNDECLARED_STREAM_SIZE: u64 = u64::MAX;

/// How a value is laid out after its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Len = 2,
    Stream = 3,
}

impl WireType {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::Varint),
            2 => Ok(Self::Len),
            3 => Ok(Self::Stream),
            other => Err(WireError::UnknownWireType(other)),
        }
    }
}

/// Growable output buffer for tagged fields.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Write a field key.
    pub fn put_key(&mut self, tag: u32, wire_type: WireType) -> Result<()> {
        if tag > MAX_TAG {
            return Err(WireError::TagOutOfRange(tag));
        }
        put_varint(&mut self.buf, (u64::from(tag) << 3) | wire_type as u64);
        Ok(())
    }

    pub fn put_varint(&mut self, value: u64) {
        put_varint(&mut self.buf, value);
    }

    /// Append bytes with no prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write `bytes` preceded by its length.
    pub fn put_len_prefixed(&mut self, bytes: &[u8]) {
        put_varint(&mut self.buf, bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// Run `f` against a scratch writer and append its output length-prefixed.
    pub fn put_nested<E, F>(&mut self, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut WireWriter) -> std::result::Result<(), E>,
    {
        let mut inner = WireWriter::new();
        f(&mut inner)?;
        self.put_len_prefixed(&inner.buf);
        Ok(())
    }

    /// Start a stream value with its declared total size.
    pub fn begin_stream(&mut self, declared: u64) {
        put_varint(&mut self.buf, declared);
    }

    /// Append one non-empty stream chunk.
    pub fn put_chunk(&mut self, chunk: &[u8]) {
        debug_assert!(!chunk.is_empty(), "empty chunk terminates a stream");
        self.put_len_prefixed(chunk);
    }

    /// Terminate a stream value.
    pub fn end_stream(&mut self) {
        put_varint(&mut self.buf, 0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

/// Cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn get_varint(&mut self) -> Result<u64> {
        let (value, used) = get_varint(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Take the next `len` bytes.
    pub fn get_bytes(&mut self, len: u64) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available as u64 {
            return Err(WireError::Truncated {
                needed: len,
                available,
            });
        }
        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.buf[start..self.pos])
    }

    /// Take a length-prefixed value, rejecting it before slicing if the
    /// prefix exceeds `max`.
    pub fn get_len_prefixed(&mut self, max: Option<u64>, tag: u32) -> Result<&'a [u8]> {
        let len = self.get_varint()?;
        check_bound(tag, len, max)?;
        self.get_bytes(len)
    }

    /// Read a field key.
    pub fn get_key(&mut self) -> Result<(u32, WireType)> {
        let key = self.get_varint()?;
        let wire_type = WireType::from_bits((key & 0x7) as u8)?;
        let tag = key >> 3;
        if tag > u64::from(MAX_TAG) {
            return Err(WireError::TagOutOfRange(u32::MAX));
        }
        Ok((tag as u32, wire_type))
    }

    /// Skip one value of the given wire type, returning the bytes it spanned.
    pub fn skip_value(&mut self, wire_type: WireType) -> Result<&'a [u8]> {
        let start = self.pos;
        match wire_type {
            WireType::Varint => {
                self.get_varint()?;
            }
            WireType::Len => {
                let len = self.get_varint()?;
                self.get_bytes(len)?;
            }
            WireType::Stream => {
                let mut stream = StreamReader::new(self.clone())?;
                while stream.next_chunk()?.is_some() {}
                self.pos = start + stream.consumed();
            }
        }
        Ok(&self.buf[start..self.pos])
    }
}

/// Fail with `BoundExceeded` when `size` is over `max`.
pub fn check_bound(tag: u32, size: u64, max: Option<u64>) -> Result<()> {
    match max {
        Some(max) if size > max => Err(WireError::BoundExceeded { tag, size, max }),
        _ => Ok(()),
    }
}

/// Chunk-by-chunk reader over a stream value.
#[derive(Debug)]
pub struct StreamReader<'a> {
    inner: WireReader<'a>,
    start: usize,
    declared: u64,
    finished: bool,
}

impl<'a> StreamReader<'a> {
    pub fn new(mut inner: WireReader<'a>) -> Result<Self> {
        let start = inner.position();
        let declared = inner.get_varint()?;
        Ok(Self {
            inner,
            start,
            declared,
            finished: false,
        })
    }

    /// Declared total size, if the sender knew it.
    pub fn declared(&self) -> Option<u64> {
        (self.declared != UNDECLARED_STREAM_SIZE).then_some(self.declared)
    }

    /// Next chunk, or `None` once the terminator has been read.
    pub fn next_chunk(&mut self) -> Result<Option<&'a [u8]>> {
        if self.finished {
            return Ok(None);
        }
        let len = self.inner.get_varint()?;
        if len == 0 {
            self.finished = true;
            return Ok(None);
        }
        self.inner.get_bytes(len).map(Some)
    }

    /// Bytes consumed from the start of the stream value.
    pub fn consumed(&self) -> usize {
        self.inner.position() - self.start
    }
}

/// One field located in a message body, not yet decoded.
#[derive(Debug, Clone, Copy)]
pub struct RawField<'a> {
    pub tag: u32,
    pub wire_type: WireType,
    /// Value bytes. For `Len` fields the length prefix is stripped.
    pub body: &'a [u8],
}

impl<'a> RawField<'a> {
    pub fn reader(&self) -> WireReader<'a> {
        WireReader::new(self.body)
    }

    /// Fail unless this field has the expected wire type.
    pub fn expect(&self, expected: WireType) -> Result<()> {
        if self.wire_type != expected {
            return Err(WireError::WireTypeMismatch {
                tag: self.tag,
                expected,
                found: self.wire_type,
            });
        }
        Ok(())
    }
}

/// Locate every field in a message body by tag.
///
/// Values are not copied; unknown tags can be skipped by wire type alone.
pub fn index_fields(body: &[u8]) -> Result<BTreeMap<u32, RawField<'_>>> {
    index_fields_bounded(body, |_| None)
}

/// Like [`index_fields`], checking the byte bound `bound(tag)` against each
/// length prefix and declared stream size as soon as it is read, before
/// the value itself is touched.
pub fn index_fields_bounded<F>(body: &[u8], bound: F) -> Result<BTreeMap<u32, RawField<'_>>>
where
    F: Fn(u32) -> Option<u64>,
{
    let mut reader = WireReader::new(body);
    let mut fields = BTreeMap::new();
    while !reader.is_empty() {
        let (tag, wire_type) = reader.get_key()?;
        let value = match wire_type {
            WireType::Len => reader.get_len_prefixed(bound(tag), tag)?,
            WireType::Stream => {
                let declared = reader.clone().get_varint()?;
                if declared != UNDECLARED_STREAM_SIZE {
                    check_bound(tag, declared, bound(tag))?;
                }
                reader.skip_value(WireType::Stream)?
            }
            WireType::Varint => reader.skip_value(WireType::Varint)?,
        };
        let raw = RawField {
            tag,
            wire_type,
            body: value,
        };
        if fields.insert(tag, raw).is_some() {
            return Err(WireError::DuplicateTag(tag));
        }
    }
    Ok(fields)
}
