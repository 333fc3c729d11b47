//! Family 1: account management before login.

use bytes::Bytes;
use storeproto_schema::{
    clamp_after_decode, field, group, respond_to, version_ordering, Envelope, ProtocolFamily,
    Registrar, Result, VersionRecord, UNSUPPORTED,
};
use storeproto_wire::FamilyId;

use super::core;
use crate::records::AccountState;
use crate::secret::Secret;
use crate::BLOB_MAX_SIZE;

pub const ID: FamilyId = storeproto_wire::AUTH;

/// Capabilities of the auth family. Sent by the client only; the client
/// never learns the server's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub version: u32,
    pub init_request: u32,
}

impl Version {
    pub const VERSION: u32 = 1;
    pub const INIT_REQUEST: u32 = 1;
}

impl Default for Version {
    fn default() -> Self {
        Self::local()
    }
}

record!(Version => [
    field!(1, "version", version),
    group!("features", |v, _ctx| v.version == Version::VERSION, [
        field!(3, "init_request", init_request),
    ]),
], after_decode = clamp_after_decode::<Version>);

version_ordering!(Version);

impl VersionRecord for Version {
    const FAMILY: &'static str = "auth";
    const LOCAL_MAX_VERSION: u32 = Self::VERSION;

    fn local() -> Self {
        Self {
            version: Self::VERSION,
            init_request: Self::INIT_REQUEST,
        }
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn counters(&self) -> Vec<(&'static str, u32)> {
        vec![("init_request", self.init_request)]
    }

    fn clear(&mut self) {
        self.init_request = UNSUPPORTED;
    }
}

/// First message on an auth connection.
#[derive(Debug, Default, PartialEq)]
pub struct InitRequest {
    pub envelope: Envelope,
    pub auth_version: Version,
    pub core_version: core::Version,
}

message!(InitRequest => [
    field!(1, "auth_version", auth_version),
    group!("versions", |m, _ctx| m.auth_version.init_request == Version::INIT_REQUEST, [
        field!(3, "core_version", core_version),
    ]),
]);

impl InitRequest {
    pub fn local() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct CreateRequest {
    pub envelope: Envelope,
    pub pass: Secret,
    pub user: String,
    pub email: String,
    pub captcha_text: String,
    pub captcha_token: String,
}

message!(CreateRequest => [
    field!(1, "pass", pass),
    field!(2, "user", user),
    field!(3, "email", email),
    field!(4, "captcha_text", captcha_text),
    field!(5, "captcha_token", captcha_token),
]);

#[derive(Debug, Default, PartialEq)]
pub struct ValidateRequest {
    pub envelope: Envelope,
    pub ticket: Secret,
    pub text: String,
    pub captcha_text: String,
    pub captcha_token: String,
}

message!(ValidateRequest => [
    field!(1, "ticket", ticket),
    field!(2, "text", text),
    field!(3, "captcha_text", captcha_text),
    field!(4, "captcha_token", captcha_token),
]);

#[derive(Debug, Default, PartialEq)]
pub struct AmendRequest {
    pub envelope: Envelope,
    pub ticket: Secret,
    pub new_pass: Secret,
    pub new_user: String,
    pub new_email: String,
    pub pass: Secret,
    pub captcha_text: String,
    pub captcha_token: String,
}

message!(AmendRequest => [
    field!(1, "ticket", ticket),
    field!(2, "new_pass", new_pass),
    field!(3, "new_user", new_user),
    field!(4, "new_email", new_email),
    field!(5, "pass", pass),
    field!(6, "captcha_text", captcha_text),
    field!(7, "captcha_token", captcha_token),
]);

#[derive(Debug, Default, PartialEq)]
pub struct FetchRequest {
    pub envelope: Envelope,
}

message!(FetchRequest => []);

#[derive(Debug, Default, PartialEq)]
pub struct FetchResponse {
    pub envelope: Envelope,
    pub user: String,
    pub email: String,
    pub state: AccountState,
}

message!(FetchResponse => [
    field!(1, "user", user),
    field!(2, "email", email),
    field!(3, "state", state),
]);

#[derive(Debug, Default, PartialEq)]
pub struct ResetRequest {
    pub envelope: Envelope,
    pub login: String,
    pub pass: Secret,
    pub captcha_text: String,
    pub captcha_token: String,
}

message!(ResetRequest => [
    field!(1, "login", login),
    field!(2, "pass", pass),
    field!(3, "captcha_text", captcha_text),
    field!(4, "captcha_token", captcha_token),
]);

#[derive(Debug, Default, PartialEq)]
pub struct CaptchaRequest {
    pub envelope: Envelope,
}

message!(CaptchaRequest => []);

#[derive(Debug, Default, PartialEq)]
pub struct CaptchaResponse {
    pub envelope: Envelope,
    pub captcha_token: String,
    pub captcha_image: Bytes,
    pub captcha_audio: Bytes,
}

message!(CaptchaResponse => [
    field!(1, "captcha_token", captcha_token),
    field!(2, "captcha_image", captcha_image, max_size = BLOB_MAX_SIZE),
    field!(3, "captcha_audio", captcha_audio),
]);

#[derive(Debug, Default, PartialEq)]
pub struct DeleteRequest {
    pub envelope: Envelope,
    pub ticket: Secret,
    pub pass: Secret,
    pub reason: String,
}

message!(DeleteRequest => [
    field!(1, "ticket", ticket),
    field!(2, "pass", pass),
    field!(3, "reason", reason),
]);

respond_to!(
    InitRequest => core::InitResponse,
    FetchRequest => FetchResponse,
    CaptchaRequest => CaptchaResponse,
    CreateRequest => core::Response,
    ValidateRequest => core::Response,
    AmendRequest => core::Response,
    ResetRequest => core::Response,
    DeleteRequest => core::Response,
);

/// Auth family marker.
pub struct Auth;

impl ProtocolFamily for Auth {
    const ID: FamilyId = ID;
    const NAME: &'static str = "auth";
    type Version = Version;

    fn protocol_table(registrar: &mut Registrar<'_>) -> Result<()> {
        registrar
            .register::<InitRequest>(1)?
            .register::<CreateRequest>(2)?
            .register::<ValidateRequest>(3)?
            .register::<AmendRequest>(4)?
            .register::<FetchRequest>(5)?
            .register::<FetchResponse>(6)?
            .register::<ResetRequest>(7)?
            .register::<CaptchaRequest>(8)?
            .register::<CaptchaResponse>(9)?
            .register::<DeleteRequest>(10)?;
        Ok(())
    }
}
