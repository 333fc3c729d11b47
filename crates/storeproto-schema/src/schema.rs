//! Data-driven message schemas.
//!
//! A schema is an ordered list of entries. An entry is either a tagged field
//! bound to a struct member through an accessor pair, or a group of entries
//! guarded by a predicate over the message decoded so far and the
//! connection's negotiated versions. The same schema drives encoding,
//! decoding and inspection; see [`crate::reflect`].

use std::collections::BTreeMap;
use std::marker::PhantomData;

use storeproto_wire::{RawField, WireType, WireWriter};

use crate::context::Context;
use crate::error::Result;
use crate::reflect::{walk, Decoder, Encoder, TagInfo, TagInspector};
use crate::value::{encode_untagged, WireValue};

/// Default ceiling for one stream chunk: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Static description of one field as seen by a value codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub tag: u32,
    pub name: &'static str,
    /// Byte length for strings/blobs, element count for collections,
    /// total bytes for streams.
    pub max_size: Option<u64>,
    /// Largest chunk a stream field writes or accepts.
    pub chunk_size: usize,
}

impl FieldMeta {
    pub const fn new(tag: u32, name: &'static str) -> Self {
        Self {
            tag,
            name,
            max_size: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Meta for the elements of a collection: same tag, no bound.
    pub fn element(&self) -> Self {
        Self {
            max_size: None,
            ..*self
        }
    }
}

trait FieldAccess<M>: Send + Sync {
    fn wire_type(&self) -> WireType;
    fn byte_bounded(&self) -> bool;
    fn encode(&self, msg: &M, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context)
        -> Result<()>;
    fn decode(&self, msg: &mut M, raw: RawField<'_>, meta: &FieldMeta, ctx: &Context)
        -> Result<()>;
}

struct Accessor<M, T, G, S> {
    get: G,
    get_mut: S,
    _marker: PhantomData<fn() -> (M, T)>,
}

impl<M, T, G, S> FieldAccess<M> for Accessor<M, T, G, S>
where
    T: WireValue,
    G: Fn(&M) -> &T + Send + Sync,
    S: Fn(&mut M) -> &mut T + Send + Sync,
{
    fn wire_type(&self) -> WireType {
        T::WIRE_TYPE
    }

    fn byte_bounded(&self) -> bool {
        T::BYTE_BOUND
    }

    fn encode(
        &self,
        msg: &M,
        out: &mut WireWriter,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()> {
        out.put_key(meta.tag, T::WIRE_TYPE)?;
        encode_untagged((self.get)(msg), out, meta, ctx)
    }

    fn decode(
        &self,
        msg: &mut M,
        raw: RawField<'_>,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()> {
        raw.expect(T::WIRE_TYPE)?;
        let mut reader = raw.reader();
        (self.get_mut)(msg).decode_body(&mut reader, meta, ctx)
    }
}

/// One tagged field of message type `M`.
pub struct Field<M> {
    meta: FieldMeta,
    access: Box<dyn FieldAccess<M>>,
}

impl<M: 'static> Field<M> {
    pub fn new<T, G, S>(tag: u32, name: &'static str, get: G, get_mut: S) -> Self
    where
        T: WireValue + 'static,
        G: Fn(&M) -> &T + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut T + Send + Sync + 'static,
    {
        Self {
            meta: FieldMeta::new(tag, name),
            access: Box::new(Accessor {
                get,
                get_mut,
                _marker: PhantomData,
            }),
        }
    }

    /// Bound the field; see [`FieldMeta::max_size`].
    pub fn max_size(mut self, max: u64) -> Self {
        self.meta.max_size = Some(max);
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.meta.chunk_size = size;
        self
    }
}

impl<M> Field<M> {
    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    pub fn tag(&self) -> u32 {
        self.meta.tag
    }

    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    pub fn wire_type(&self) -> WireType {
        self.access.wire_type()
    }

    /// Bound on the encoded byte length, if `max_size` is one.
    pub fn byte_bound(&self) -> Option<u64> {
        self.meta.max_size.filter(|_| self.access.byte_bounded())
    }

    pub(crate) fn encode(&self, msg: &M, out: &mut WireWriter, ctx: &Context) -> Result<()> {
        self.access.encode(msg, out, &self.meta, ctx)
    }

    pub(crate) fn decode(&self, msg: &mut M, raw: RawField<'_>, ctx: &Context) -> Result<()> {
        self.access.decode(msg, raw, &self.meta, ctx)
    }
}

type Predicate<M> = Box<dyn Fn(&M, &Context) -> bool + Send + Sync>;

/// Entries present only while `predicate` holds.
///
/// The predicate sees the message as decoded up to this point, so it may
/// depend on earlier fields but never on later ones.
pub struct Group<M> {
    name: &'static str,
    predicate: Predicate<M>,
    entries: Vec<Entry<M>>,
}

impl<M: 'static> Group<M> {
    pub fn new<P>(name: &'static str, predicate: P, entries: Vec<Entry<M>>) -> Self
    where
        P: Fn(&M, &Context) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Box::new(predicate),
            entries,
        }
    }
}

impl<M> Group<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[Entry<M>] {
        &self.entries
    }

    pub fn is_present(&self, msg: &M, ctx: &Context) -> bool {
        (self.predicate)(msg, ctx)
    }
}

pub enum Entry<M> {
    Field(Field<M>),
    Group(Group<M>),
}

type DecodeHook<M> = fn(&mut M, &Context) -> Result<()>;

/// Complete, immutable schema of one record or message type.
pub struct Schema<M> {
    name: &'static str,
    entries: Vec<Entry<M>>,
    after_decode: Option<DecodeHook<M>>,
}

impl<M: 'static> Schema<M> {
    pub fn new(name: &'static str, entries: Vec<Entry<M>>) -> Self {
        let schema = Self {
            name,
            entries,
            after_decode: None,
        };
        debug_assert!(
            schema.duplicate_tag().is_none(),
            "{name}: tag {:?} declared twice",
            schema.duplicate_tag()
        );
        schema
    }

    /// Run `hook` after every successful decode of this type.
    pub fn after_decode(mut self, hook: DecodeHook<M>) -> Self {
        self.after_decode = Some(hook);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[Entry<M>] {
        &self.entries
    }

    /// Every (tag, name) declared anywhere in the schema, groups included,
    /// in declaration order.
    pub fn declared_tags(&self) -> Vec<(u32, &'static str)> {
        fn collect<M>(entries: &[Entry<M>], out: &mut Vec<(u32, &'static str)>) {
            for entry in entries {
                match entry {
                    Entry::Field(field) => out.push((field.tag(), field.name())),
                    Entry::Group(group) => collect(&group.entries, out),
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.entries, &mut out);
        out
    }

    /// Byte bound of the field declared under `tag`, groups included.
    pub fn byte_bound(&self, tag: u32) -> Option<u64> {
        fn find<M>(entries: &[Entry<M>], tag: u32) -> Option<Option<u64>> {
            entries.iter().find_map(|entry| match entry {
                Entry::Field(field) if field.tag() == tag => Some(field.byte_bound()),
                Entry::Field(_) => None,
                Entry::Group(group) => find(&group.entries, tag),
            })
        }
        find(&self.entries, tag).flatten()
    }

    /// Index a body by tag, rejecting any length prefix over its field's
    /// byte bound before the value is sliced.
    pub fn index<'b>(&self, body: &'b [u8]) -> Result<BTreeMap<u32, RawField<'b>>> {
        Ok(storeproto_wire::index_fields_bounded(body, |tag| {
            self.byte_bound(tag)
        })?)
    }

    /// First tag declared more than once, if any. Tag 0 is reserved for the
    /// message format version and counts as declared.
    pub fn duplicate_tag(&self) -> Option<u32> {
        let mut seen = BTreeMap::new();
        seen.insert(0u32, "version");
        self.declared_tags()
            .into_iter()
            .find_map(|(tag, name)| seen.insert(tag, name).map(|_| tag))
    }

    /// Append the tagged fields of `msg` that are present under `ctx`.
    pub fn encode(&self, msg: &M, out: &mut WireWriter, ctx: &Context) -> Result<()> {
        let mut encoder = Encoder::new(msg, out, ctx);
        walk(&self.entries, &mut encoder)
    }

    /// Decode a body of tagged fields into `msg`.
    ///
    /// Fields absent from the body keep their current value.
    pub fn decode(&self, msg: &mut M, body: &[u8], ctx: &Context) -> Result<()> {
        let fields = self.index(body)?;
        self.decode_fields(msg, fields, ctx)
    }

    pub(crate) fn decode_fields(
        &self,
        msg: &mut M,
        fields: BTreeMap<u32, RawField<'_>>,
        ctx: &Context,
    ) -> Result<()> {
        let mut decoder = Decoder::new(msg, fields, ctx);
        walk(&self.entries, &mut decoder)?;
        for tag in decoder.unvisited() {
            if ctx.log_unknown_tags() {
                tracing::debug!(record = self.name, tag, "unknown tag skipped");
            } else {
                tracing::trace!(record = self.name, tag, "unknown tag skipped");
            }
        }
        if let Some(hook) = self.after_decode {
            hook(msg, ctx)?;
        }
        Ok(())
    }

    /// Fields that would be written for `msg` under `ctx`, without encoding.
    pub fn inspect(&self, msg: &M, ctx: &Context) -> Result<Vec<TagInfo>> {
        let mut inspector = TagInspector::new(msg, ctx);
        walk(&self.entries, &mut inspector)?;
        Ok(inspector.into_tags())
    }
}

/// Declare a field bound to `self.<member>`.
///
/// ```ignore
/// field!(10, "image_blob", image_blob, max_size = 1024 * 1024)
/// ```
#[macro_export]
macro_rules! field {
    ($tag:expr, $name:literal, $member:ident $(, $opt:ident = $value:expr)* $(,)?) => {
        $crate::Entry::Field(
            $crate::Field::new(
                $tag,
                $name,
                |m: &Self| &m.$member,
                |m: &mut Self| &mut m.$member,
            )
            $(.$opt($value))*
        )
    };
}

/// Declare a predicate-guarded group of entries.
#[macro_export]
macro_rules! group {
    ($name:literal, |$msg:pat_param, $ctx:pat_param| $predicate:expr, [$($entry:expr),* $(,)?]) => {
        $crate::Entry::Group($crate::Group::new(
            $name,
            |$msg: &Self, $ctx: &$crate::Context| $predicate,
            vec![$($entry),*],
        ))
    };
}

/// Build a type's schema once and hand out the shared instance.
#[macro_export]
macro_rules! schema {
    ($ty:ty => [$($entry:expr),* $(,)?] $(, after_decode = $hook:expr)? $(,)?) => {{
        static SCHEMA: ::std::sync::OnceLock<$crate::Schema<$ty>> = ::std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            $crate::Schema::new(<$ty as $crate::Record>::NAME, vec![$($entry),*])
                $(.after_decode($hook))?
        })
    }};
}
