use std::any::Any;
use std::fmt;

use bytes::Bytes;
use storeproto_wire::{WireType, WireWriter};

use crate::context::Context;
use crate::error::Result;
use crate::schema::Schema;

/// A type with a tagged-field schema.
pub trait Record: Default + fmt::Debug + Send + Sync + 'static {
    const NAME: &'static str;

    fn schema() -> &'static Schema<Self>;
}

/// Addressing metadata of a message. Travels in the frame header, not in
/// the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Correlates a response with its request. Zero when unused.
    pub request_id: u64,
    /// Peer the message came from, as named by the receiving connection.
    pub sender: String,
}

impl Envelope {
    /// Envelope for a response to the message carrying `self`.
    pub fn reply(&self) -> Self {
        self.clone()
    }
}

/// A top-level message: a record with its own format version and envelope.
///
/// The format version is written as tag 0 ahead of every schema field.
pub trait Message: Record {
    const FORMAT_VERSION: u32;

    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;
}

/// Tag of the unconditional per-message format version.
pub const FORMAT_VERSION_TAG: u32 = 0;

/// Encode the body of `msg` under the negotiated versions in `ctx`.
pub fn encode<M: Message>(msg: &M, ctx: &Context) -> Result<Bytes> {
    let mut out = WireWriter::new();
    out.put_key(FORMAT_VERSION_TAG, WireType::Varint)?;
    out.put_varint(u64::from(M::FORMAT_VERSION));
    M::schema().encode(msg, &mut out, ctx)?;
    Ok(out.freeze())
}

/// Decode `body` into an existing message.
///
/// On error `msg` holds whatever was decoded before the failure; a stream
/// field that ended short, for example, reports itself incomplete.
pub fn decode_into<M: Message>(msg: &mut M, body: &[u8], ctx: &Context) -> Result<()> {
    let mut fields = M::schema().index(body)?;
    if let Some(raw) = fields.remove(&FORMAT_VERSION_TAG) {
        raw.expect(WireType::Varint)?;
        let version = raw.reader().get_varint()?;
        if version > u64::from(M::FORMAT_VERSION) {
            tracing::trace!(
                message = M::NAME,
                version,
                local = M::FORMAT_VERSION,
                "newer message format, unknown fields will be skipped"
            );
        }
    }
    M::schema().decode_fields(msg, fields, ctx)
}

pub fn decode<M: Message>(body: &[u8], ctx: &Context) -> Result<M> {
    let mut msg = M::default();
    decode_into(&mut msg, body, ctx)?;
    Ok(msg)
}

/// Type-erased message handed out by the registry.
pub trait AnyMessage: Any + Send + fmt::Debug {
    fn message_name(&self) -> &'static str;

    fn message_envelope(&self) -> &Envelope;

    fn message_envelope_mut(&mut self) -> &mut Envelope;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<M: Message> AnyMessage for M {
    fn message_name(&self) -> &'static str {
        M::NAME
    }

    fn message_envelope(&self) -> &Envelope {
        self.envelope()
    }

    fn message_envelope_mut(&mut self) -> &mut Envelope {
        self.envelope_mut()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn AnyMessage {
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }

    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn downcast<M: Message>(self: Box<Self>) -> Option<Box<M>> {
        self.into_any().downcast::<M>().ok()
    }
}

/// Make `$resp` constructible from a reference to `$req`, copying the
/// request envelope.
#[macro_export]
macro_rules! respond_to {
    ($($req:ty => $resp:ty),+ $(,)?) => {$(
        impl ::std::convert::From<&$req> for $resp {
            fn from(request: &$req) -> Self {
                let mut response = <$resp as ::std::default::Default>::default();
                *$crate::Message::envelope_mut(&mut response) =
                    $crate::Message::envelope(request).reply();
                response
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{clamp_after_decode, VersionRecord, UNSUPPORTED};
    use crate::{field, group, record_value, schema};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct PeerVersion {
        version: u32,
        detail: u32,
    }

    impl Default for PeerVersion {
        fn default() -> Self {
            Self::local()
        }
    }

    impl Record for PeerVersion {
        const NAME: &'static str = "PeerVersion";

        fn schema() -> &'static Schema<Self> {
            schema!(PeerVersion => [
                field!(1, "version", version),
                group!("counters", |v, _ctx| v.version == 1, [field!(3, "detail", detail)]),
            ], after_decode = clamp_after_decode::<PeerVersion>)
        }
    }

    record_value!(PeerVersion);

    impl VersionRecord for PeerVersion {
        const FAMILY: &'static str = "peer";
        const LOCAL_MAX_VERSION: u32 = 1;

        fn local() -> Self {
            Self {
                version: 1,
                detail: 1,
            }
        }

        fn version(&self) -> u32 {
            self.version
        }

        fn counters(&self) -> Vec<(&'static str, u32)> {
            vec![("detail", self.detail)]
        }

        fn clear(&mut self) {
            self.detail = UNSUPPORTED;
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Lookup {
        envelope: Envelope,
        name: String,
        limit: u32,
        detail: String,
        peer: PeerVersion,
    }

    impl Record for Lookup {
        const NAME: &'static str = "Lookup";

        fn schema() -> &'static Schema<Self> {
            schema!(Lookup => [
                field!(1, "name", name, max_size = 16),
                field!(2, "limit", limit),
                group!("detail", |_m, ctx| {
                    ctx.negotiated::<PeerVersion>().is_some_and(|v| v.detail == 1)
                }, [field!(3, "detail", detail)]),
                group!("peer", |m, _ctx| m.limit > 0, [field!(4, "peer", peer)]),
            ])
        }
    }

    impl Message for Lookup {
        const FORMAT_VERSION: u32 = 1;

        fn envelope(&self) -> &Envelope {
            &self.envelope
        }

        fn envelope_mut(&mut self) -> &mut Envelope {
            &mut self.envelope
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct LookupReply {
        envelope: Envelope,
    }

    impl Record for LookupReply {
        const NAME: &'static str = "LookupReply";

        fn schema() -> &'static Schema<Self> {
            schema!(LookupReply => [])
        }
    }

    impl Message for LookupReply {
        const FORMAT_VERSION: u32 = 1;

        fn envelope(&self) -> &Envelope {
            &self.envelope
        }

        fn envelope_mut(&mut self) -> &mut Envelope {
            &mut self.envelope
        }
    }

    crate::respond_to!(Lookup => LookupReply);

    fn sample() -> Lookup {
        Lookup {
            name: "alice".into(),
            limit: 3,
            detail: "verbose".into(),
            ..Lookup::default()
        }
    }

    fn negotiated() -> Context {
        Context::new().with_negotiated(PeerVersion::local())
    }

    #[test]
    fn roundtrip_with_all_groups_present() {
        let ctx = negotiated();
        let msg = sample();
        let body = encode(&msg, &ctx).unwrap();
        assert_eq!(decode::<Lookup>(&body, &ctx).unwrap(), msg);
    }

    #[test]
    fn version_gated_group_absent_decodes_default() {
        let ctx = Context::new();
        let body = encode(&sample(), &ctx).unwrap();
        let decoded = decode::<Lookup>(&body, &negotiated()).unwrap();
        assert_eq!(decoded.detail, "");
        assert_eq!(decoded.name, "alice");
    }

    #[test]
    fn discriminant_gates_later_fields() {
        let ctx = negotiated();
        let msg = Lookup {
            limit: 0,
            peer: PeerVersion {
                version: 1,
                detail: 9,
            },
            ..sample()
        };
        let body = encode(&msg, &ctx).unwrap();
        let decoded = decode::<Lookup>(&body, &ctx).unwrap();
        assert_eq!(decoded.peer, PeerVersion::local());
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let ctx = negotiated();
        let mut body = encode(&sample(), &ctx).unwrap().to_vec();
        let mut extra = WireWriter::new();
        extra.put_key(40, WireType::Len).unwrap();
        extra.put_len_prefixed(b"from the future");
        extra.put_key(41, WireType::Stream).unwrap();
        extra.begin_stream(3);
        extra.put_chunk(b"abc");
        extra.end_stream();
        body.extend_from_slice(extra.as_slice());

        assert_eq!(decode::<Lookup>(&body, &ctx).unwrap(), sample());
    }

    #[test]
    fn bound_exceeded_fails_decode() {
        let ctx = negotiated();
        let mut out = WireWriter::new();
        out.put_key(1, WireType::Len).unwrap();
        out.put_len_prefixed(&[b'x'; 32]);
        let err = decode::<Lookup>(out.as_slice(), &ctx).unwrap_err();
        assert!(err.is_bound_exceeded());

        let oversized = Lookup {
            name: "x".repeat(17),
            ..Lookup::default()
        };
        assert!(encode(&oversized, &ctx).unwrap_err().is_bound_exceeded());
    }

    #[test]
    fn bound_is_checked_before_a_short_body() {
        let ctx = negotiated();
        let mut out = WireWriter::new();
        out.put_key(1, WireType::Len).unwrap();
        out.put_varint(4096);
        out.put_raw(b"alice");
        let err = decode::<Lookup>(out.as_slice(), &ctx).unwrap_err();
        assert!(err.is_bound_exceeded(), "{err}");

        // an unbounded field with the same shape is only short
        let mut out = WireWriter::new();
        out.put_key(3, WireType::Len).unwrap();
        out.put_varint(4096);
        out.put_raw(b"verbose");
        let err = decode::<Lookup>(out.as_slice(), &ctx).unwrap_err();
        assert!(!err.is_bound_exceeded());
    }

    #[test]
    fn format_version_written_first() {
        let body = encode(&LookupReply::default(), &Context::new()).unwrap();
        assert_eq!(body.as_ref(), &[0x00, 0x01]);
    }

    #[test]
    fn nested_version_record_is_clamped() {
        let ctx = negotiated();
        let msg = Lookup {
            peer: PeerVersion {
                version: 5,
                detail: 1,
            },
            ..sample()
        };
        let body = encode(&msg, &ctx).unwrap();
        let decoded = decode::<Lookup>(&body, &ctx).unwrap();
        assert_eq!(decoded.peer.version, 5);
        assert!(decoded.peer.is_cleared());
    }

    #[test]
    fn response_copies_request_envelope() {
        let mut request = sample();
        request.envelope = Envelope {
            request_id: 17,
            sender: "client-a".into(),
        };
        let reply = LookupReply::from(&request);
        assert_eq!(reply.envelope, request.envelope);
    }

    #[test]
    fn inspect_lists_present_fields_with_groups() {
        let tags = Lookup::schema().inspect(&sample(), &negotiated()).unwrap();
        let listed: Vec<_> = tags.iter().map(|t| (t.tag, t.name, t.group)).collect();
        assert_eq!(
            listed,
            [
                (1, "name", None),
                (2, "limit", None),
                (3, "detail", Some("detail")),
                (4, "peer", Some("peer")),
            ]
        );
        assert_eq!(tags[0].max_size, Some(16));

        let bare = Lookup::schema().inspect(&Lookup::default(), &Context::new()).unwrap();
        assert_eq!(bare.iter().map(|t| t.tag).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn erased_message_downcasts() {
        let boxed: Box<dyn AnyMessage> = Box::new(sample());
        assert_eq!(boxed.message_name(), "Lookup");
        assert!(boxed.is::<Lookup>());
        assert!(boxed.downcast_ref::<LookupReply>().is_none());
        let lookup = boxed.downcast::<Lookup>().unwrap();
        assert_eq!(lookup.limit, 3);
    }
}
