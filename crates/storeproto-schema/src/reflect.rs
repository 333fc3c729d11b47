//! Direction-generic schema walk.
//!
//! [`walk`] visits a schema's entries in declaration order and hands every
//! field whose enclosing groups are present to a [`Reflector`]. Encoding,
//! decoding and inspection are three reflectors over the same walk; which
//! one runs is fixed by the type, not by a flag checked per field.

use std::collections::BTreeMap;

use storeproto_wire::{RawField, WireType, WireWriter};

use crate::context::Context;
use crate::error::Result;
use crate::schema::{Entry, Field, Group};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
    Inspect,
}

/// Receives the fields of one schema walk.
pub trait Reflector<M> {
    const DIRECTION: Direction;

    fn context(&self) -> &Context;

    /// The message as it stands: fully populated when encoding, decoded up
    /// to the current field when decoding.
    fn message(&self) -> &M;

    fn visit_field(&mut self, field: &Field<M>) -> Result<()>;

    fn enter_group(&mut self, _group: &Group<M>) {}

    fn leave_group(&mut self, _group: &Group<M>) {}
}

/// Walk `entries` in order, descending into groups whose predicate holds.
pub fn walk<M, R: Reflector<M>>(entries: &[Entry<M>], reflector: &mut R) -> Result<()> {
    for entry in entries {
        match entry {
            Entry::Field(field) => reflector.visit_field(field)?,
            Entry::Group(group) => {
                if !group.is_present(reflector.message(), reflector.context()) {
                    tracing::trace!(
                        group = group.name(),
                        direction = ?R::DIRECTION,
                        "group absent"
                    );
                    continue;
                }
                reflector.enter_group(group);
                walk(group.entries(), reflector)?;
                reflector.leave_group(group);
            }
        }
    }
    Ok(())
}

/// Writes every present field of a message.
pub struct Encoder<'a, M> {
    msg: &'a M,
    out: &'a mut WireWriter,
    ctx: &'a Context,
}

impl<'a, M> Encoder<'a, M> {
    pub fn new(msg: &'a M, out: &'a mut WireWriter, ctx: &'a Context) -> Self {
        Self { msg, out, ctx }
    }
}

impl<M> Reflector<M> for Encoder<'_, M> {
    const DIRECTION: Direction = Direction::Encode;

    fn context(&self) -> &Context {
        self.ctx
    }

    fn message(&self) -> &M {
        self.msg
    }

    fn visit_field(&mut self, field: &Field<M>) -> Result<()> {
        field.encode(self.msg, self.out, self.ctx)
    }
}

/// Fills a message from a body that has already been indexed by tag.
pub struct Decoder<'a, 'b, M> {
    msg: &'a mut M,
    fields: BTreeMap<u32, RawField<'b>>,
    ctx: &'a Context,
}

impl<'a, 'b, M> Decoder<'a, 'b, M> {
    pub fn new(msg: &'a mut M, fields: BTreeMap<u32, RawField<'b>>, ctx: &'a Context) -> Self {
        Self { msg, fields, ctx }
    }

    /// Tags in the body that no visited field claimed.
    pub fn unvisited(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }
}

impl<M> Reflector<M> for Decoder<'_, '_, M> {
    const DIRECTION: Direction = Direction::Decode;

    fn context(&self) -> &Context {
        self.ctx
    }

    fn message(&self) -> &M {
        self.msg
    }

    fn visit_field(&mut self, field: &Field<M>) -> Result<()> {
        match self.fields.remove(&field.tag()) {
            Some(raw) => field.decode(self.msg, raw, self.ctx),
            None => {
                tracing::trace!(field = field.name(), tag = field.tag(), "field absent");
                Ok(())
            }
        }
    }
}

/// One field that a walk would touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub tag: u32,
    pub name: &'static str,
    pub wire_type: WireType,
    pub max_size: Option<u64>,
    /// Innermost group the field belongs to.
    pub group: Option<&'static str>,
}

/// Records the fields present under a context without touching bytes.
pub struct TagInspector<'a, M> {
    msg: &'a M,
    ctx: &'a Context,
    groups: Vec<&'static str>,
    tags: Vec<TagInfo>,
}

impl<'a, M> TagInspector<'a, M> {
    pub fn new(msg: &'a M, ctx: &'a Context) -> Self {
        Self {
            msg,
            ctx,
            groups: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn into_tags(self) -> Vec<TagInfo> {
        self.tags
    }
}

impl<M> Reflector<M> for TagInspector<'_, M> {
    const DIRECTION: Direction = Direction::Inspect;

    fn context(&self) -> &Context {
        self.ctx
    }

    fn message(&self) -> &M {
        self.msg
    }

    fn visit_field(&mut self, field: &Field<M>) -> Result<()> {
        self.tags.push(TagInfo {
            tag: field.tag(),
            name: field.name(),
            wire_type: field.wire_type(),
            max_size: field.meta().max_size,
            group: self.groups.last().copied(),
        });
        Ok(())
    }

    fn enter_group(&mut self, group: &Group<M>) {
        self.groups.push(group.name());
    }

    fn leave_group(&mut self, _group: &Group<M>) {
        self.groups.pop();
    }
}
