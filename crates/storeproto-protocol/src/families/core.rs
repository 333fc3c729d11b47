//! Family 0: connection-level replies and login.

use storeproto_schema::{
    clamp_after_decode, field, group, respond_to, version_ordering, Envelope, ProtocolFamily,
    Registrar, Result, VersionRecord, UNSUPPORTED,
};
use storeproto_wire::FamilyId;

use crate::error::Status;
use crate::secret::Secret;

pub const ID: FamilyId = storeproto_wire::CORE;

/// Capabilities of the core family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub version: u32,
    pub auth_request: u32,
    pub auth_response: u32,
    pub init_response: u32,
    pub response: u32,
}

impl Version {
    pub const VERSION: u32 = 1;
    pub const AUTH_REQUEST: u32 = 1;
    pub const AUTH_RESPONSE: u32 = 1;
    pub const INIT_RESPONSE: u32 = 1;
    pub const RESPONSE: u32 = 1;
}

impl Default for Version {
    fn default() -> Self {
        Self::local()
    }
}

record!(Version => [
    field!(1, "version", version),
    group!("features", |v, _ctx| v.version == Version::VERSION, [
        field!(3, "auth_request", auth_request),
        field!(4, "auth_response", auth_response),
        field!(5, "init_response", init_response),
        field!(6, "response", response),
    ]),
], after_decode = clamp_after_decode::<Version>);

version_ordering!(Version);

impl VersionRecord for Version {
    const FAMILY: &'static str = "core";
    const LOCAL_MAX_VERSION: u32 = Self::VERSION;

    fn local() -> Self {
        Self {
            version: Self::VERSION,
            auth_request: Self::AUTH_REQUEST,
            auth_response: Self::AUTH_RESPONSE,
            init_response: Self::INIT_RESPONSE,
            response: Self::RESPONSE,
        }
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn counters(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("auth_request", self.auth_request),
            ("auth_response", self.auth_response),
            ("init_response", self.init_response),
            ("response", self.response),
        ]
    }

    fn clear(&mut self) {
        self.auth_request = UNSUPPORTED;
        self.auth_response = UNSUPPORTED;
        self.init_response = UNSUPPORTED;
        self.response = UNSUPPORTED;
    }
}

/// Reply to any family's init request.
///
/// The error group is only exchanged when both sides agree on the
/// `init_response` revision; otherwise the reply decodes with an unset
/// status.
#[derive(Debug, Default, PartialEq)]
pub struct InitResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
}

message!(InitResponse => [
    group!("result", |_m, ctx| {
        ctx.negotiated::<Version>()
            .is_some_and(|v| v.init_response == Version::INIT_RESPONSE)
    }, [
        field!(1, "error", error),
        field!(2, "message", message),
    ]),
]);

#[derive(Debug, Default, PartialEq)]
pub struct AuthRequest {
    pub envelope: Envelope,
    pub pass: Secret,
    pub user: String,
    pub captcha_text: String,
    pub captcha_token: String,
}

message!(AuthRequest => [
    field!(1, "pass", pass),
    field!(2, "user", user),
    field!(3, "captcha_text", captcha_text),
    field!(4, "captcha_token", captcha_token),
]);

#[derive(Debug, Default, PartialEq)]
pub struct AuthResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
}

message!(AuthResponse => [
    field!(1, "error", error),
    field!(2, "message", message),
]);

/// Generic reply for requests without a dedicated response type.
#[derive(Debug, Default, PartialEq)]
pub struct Response {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
}

message!(Response => [
    field!(1, "error", error),
    field!(2, "message", message),
]);

impl Response {
    pub fn with_status(mut self, error: impl Into<Status>, message: impl Into<String>) -> Self {
        self.error = error.into();
        self.message = message.into();
        self
    }
}

impl InitResponse {
    pub fn with_status(mut self, error: impl Into<Status>, message: impl Into<String>) -> Self {
        self.error = error.into();
        self.message = message.into();
        self
    }
}

respond_to!(AuthRequest => AuthResponse);

/// Core family marker.
pub struct Core;

impl ProtocolFamily for Core {
    const ID: FamilyId = ID;
    const NAME: &'static str = "core";
    type Version = Version;

    fn protocol_table(registrar: &mut Registrar<'_>) -> Result<()> {
        registrar
            .register::<InitResponse>(1)?
            .register::<AuthRequest>(2)?
            .register::<AuthResponse>(3)?
            .register::<Response>(4)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeproto_schema::{decode, encode, Context, Record};

    #[test]
    fn clamped_record_equals_cleared() {
        let mut out = storeproto_schema::WireWriter::new();
        out.put_key(1, storeproto_schema::WireType::Varint).unwrap();
        out.put_varint(u64::from(Version::VERSION + 1));
        for tag in 3..=6 {
            out.put_key(tag, storeproto_schema::WireType::Varint).unwrap();
            out.put_varint(7);
        }

        let mut decoded = Version::default();
        Version::schema()
            .decode(&mut decoded, out.as_slice(), &Context::new())
            .unwrap();

        let mut expected = Version::local();
        expected.version = Version::VERSION + 1;
        expected.clear();
        assert_eq!(decoded, expected);
        assert!(!decoded.is_supported());
    }

    #[test]
    fn init_response_error_needs_negotiated_core() {
        let negotiated = Context::new().with_negotiated(Version::local());
        let reply = InitResponse::default().with_status(Status::OK, "welcome");

        let body = encode(&reply, &negotiated).unwrap();
        assert_eq!(decode::<InitResponse>(&body, &negotiated).unwrap(), reply);

        // no negotiated core record: the result group is not exchanged
        let body = encode(&reply, &Context::new()).unwrap();
        let decoded = decode::<InitResponse>(&body, &negotiated).unwrap();
        assert!(!decoded.error.is_set());
        assert!(decoded.message.is_empty());
    }

    #[test]
    fn cleared_peer_disables_init_response_group() {
        let mut peer = Version::local();
        peer.clear();
        let ctx = Context::new().with_negotiated(peer);
        let reply = InitResponse::default().with_status(Status::OK, "");
        let body = encode(&reply, &ctx).unwrap();
        assert_eq!(body.as_ref(), &[0x00, 0x01]);
    }

    #[test]
    fn auth_response_copies_envelope() {
        let request = AuthRequest {
            envelope: Envelope {
                request_id: 4,
                sender: "client".into(),
            },
            ..AuthRequest::default()
        };
        assert_eq!(AuthResponse::from(&request).envelope, request.envelope);
    }
}
