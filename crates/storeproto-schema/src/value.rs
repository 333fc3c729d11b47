//! Value codecs for field types.
//!
//! A [`WireValue`] knows its wire type and how to write or read its body.
//! For `Len` values the body excludes the length prefix: the caller either
//! wraps it ([`encode_untagged`]) or has already stripped it (field index,
//! [`decode_untagged`]).

use std::collections::VecDeque;

use bytes::Bytes;
use storeproto_wire::varint::{zigzag_decode, zigzag_encode};
use storeproto_wire::{check_bound, WireError, WireReader, WireType, WireWriter};

use crate::context::Context;
use crate::error::Result;
use crate::schema::FieldMeta;

pub trait WireValue: Default {
    const WIRE_TYPE: WireType;

    /// True when a field's `max_size` bounds the encoded byte length, so
    /// it can be enforced on the length prefix while the body is indexed.
    /// Collections bound their element count instead and leave this unset.
    const BYTE_BOUND: bool = false;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context) -> Result<()>;

    /// Decode in place. For `Len` values `input` spans exactly the body.
    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()>;
}

/// Write a value without a key, length-prefixing `Len` bodies.
pub fn encode_untagged<T: WireValue>(
    value: &T,
    out: &mut WireWriter,
    meta: &FieldMeta,
    ctx: &Context,
) -> Result<()> {
    match T::WIRE_TYPE {
        WireType::Len => out.put_nested(|inner| value.encode_body(inner, meta, ctx)),
        _ => value.encode_body(out, meta, ctx),
    }
}

/// Read a value written by [`encode_untagged`].
pub fn decode_untagged<T: WireValue>(
    value: &mut T,
    input: &mut WireReader<'_>,
    meta: &FieldMeta,
    ctx: &Context,
) -> Result<()> {
    match T::WIRE_TYPE {
        WireType::Len => {
            // bounds are checked by the body codec: bytes for blobs, count for sequences
            let body = input.get_len_prefixed(None, meta.tag)?;
            value.decode_body(&mut WireReader::new(body), meta, ctx)
        }
        _ => value.decode_body(input, meta, ctx),
    }
}

fn invalid(meta: &FieldMeta, reason: impl Into<String>) -> WireError {
    WireError::InvalidValue {
        tag: meta.tag,
        reason: reason.into(),
    }
}

/// Take the rest of a `Len` body after checking it against the field bound.
fn bounded_body<'a>(input: &mut WireReader<'a>, meta: &FieldMeta) -> Result<&'a [u8]> {
    let len = input.remaining() as u64;
    check_bound(meta.tag, len, meta.max_size)?;
    Ok(input.get_bytes(len)?)
}

impl WireValue for u64 {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn encode_body(&self, out: &mut WireWriter, _meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        out.put_varint(*self);
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        _meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        *self = input.get_varint()?;
        Ok(())
    }
}

macro_rules! narrow_unsigned {
    ($($ty:ty),+) => {$(
        impl WireValue for $ty {
            const WIRE_TYPE: WireType = WireType::Varint;

            fn encode_body(&self, out: &mut WireWriter, _meta: &FieldMeta, _ctx: &Context) -> Result<()> {
                out.put_varint(u64::from(*self));
                Ok(())
            }

            fn decode_body(
                &mut self,
                input: &mut WireReader<'_>,
                meta: &FieldMeta,
                _ctx: &Context,
            ) -> Result<()> {
                let raw = input.get_varint()?;
                *self = <$ty>::try_from(raw).map_err(|_| {
                    invalid(meta, format!("{raw} does not fit in {}", stringify!($ty)))
                })?;
                Ok(())
            }
        }
    )+};
}

narrow_unsigned!(u8, u16, u32);

impl WireValue for i64 {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn encode_body(&self, out: &mut WireWriter, _meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        out.put_varint(zigzag_encode(*self));
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        _meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        *self = zigzag_decode(input.get_varint()?);
        Ok(())
    }
}

impl WireValue for bool {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn encode_body(&self, out: &mut WireWriter, _meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        out.put_varint(u64::from(*self));
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        *self = match input.get_varint()? {
            0 => false,
            1 => true,
            other => return Err(invalid(meta, format!("{other} is not a bool")).into()),
        };
        Ok(())
    }
}

impl WireValue for String {
    const WIRE_TYPE: WireType = WireType::Len;
    const BYTE_BOUND: bool = true;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        check_bound(meta.tag, self.len() as u64, meta.max_size)?;
        out.put_raw(self.as_bytes());
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        let body = bounded_body(input, meta)?;
        let text = std::str::from_utf8(body).map_err(|err| invalid(meta, err.to_string()))?;
        self.clear();
        self.push_str(text);
        Ok(())
    }
}

impl WireValue for Bytes {
    const WIRE_TYPE: WireType = WireType::Len;
    const BYTE_BOUND: bool = true;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        check_bound(meta.tag, self.len() as u64, meta.max_size)?;
        out.put_raw(self);
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        *self = Bytes::copy_from_slice(bounded_body(input, meta)?);
        Ok(())
    }
}

macro_rules! sequence {
    ($($seq:ident),+) => {$(
        impl<T: WireValue> WireValue for $seq<T> {
            const WIRE_TYPE: WireType = WireType::Len;

            fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context) -> Result<()> {
                check_bound(meta.tag, self.len() as u64, meta.max_size)?;
                out.put_varint(self.len() as u64);
                let element = meta.element();
                for item in self {
                    encode_untagged(item, out, &element, ctx)?;
                }
                Ok(())
            }

            fn decode_body(
                &mut self,
                input: &mut WireReader<'_>,
                meta: &FieldMeta,
                ctx: &Context,
            ) -> Result<()> {
                let count = input.get_varint()?;
                check_bound(meta.tag, count, meta.max_size)?;
                // each element takes at least one byte
                if count > input.remaining() as u64 {
                    return Err(WireError::Truncated {
                        needed: count,
                        available: input.remaining(),
                    }
                    .into());
                }
                self.clear();
                let element = meta.element();
                for _ in 0..count {
                    let mut item = T::default();
                    decode_untagged(&mut item, input, &element, ctx)?;
                    self.push_back_item(item);
                }
                Ok(())
            }
        }
    )+};
}

trait PushBack<T> {
    fn push_back_item(&mut self, item: T);
}

impl<T> PushBack<T> for Vec<T> {
    fn push_back_item(&mut self, item: T) {
        self.push(item);
    }
}

impl<T> PushBack<T> for VecDeque<T> {
    fn push_back_item(&mut self, item: T) {
        self.push_back(item);
    }
}

sequence!(Vec, VecDeque);

impl<A: WireValue, B: WireValue> WireValue for (A, B) {
    const WIRE_TYPE: WireType = WireType::Len;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context) -> Result<()> {
        let element = meta.element();
        encode_untagged(&self.0, out, &element, ctx)?;
        encode_untagged(&self.1, out, &element, ctx)
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()> {
        let element = meta.element();
        decode_untagged(&mut self.0, input, &element, ctx)?;
        decode_untagged(&mut self.1, input, &element, ctx)
    }
}

/// Implement [`WireValue`] for record types as nested tagged sequences.
#[macro_export]
macro_rules! record_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::WireValue for $ty {
            const WIRE_TYPE: $crate::WireType = $crate::WireType::Len;

            fn encode_body(
                &self,
                out: &mut $crate::WireWriter,
                _meta: &$crate::FieldMeta,
                ctx: &$crate::Context,
            ) -> $crate::Result<()> {
                <$ty as $crate::Record>::schema().encode(self, out, ctx)
            }

            fn decode_body(
                &mut self,
                input: &mut $crate::WireReader<'_>,
                _meta: &$crate::FieldMeta,
                ctx: &$crate::Context,
            ) -> $crate::Result<()> {
                let body = input.get_bytes(input.remaining() as u64)?;
                <$ty as $crate::Record>::schema().decode(self, body, ctx)
            }
        }
    )+};
}
