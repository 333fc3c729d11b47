//! Family 2: the store itself. Listings, builds, media and uploads.

use std::collections::VecDeque;

use bytes::Bytes;
use storeproto_schema::{
    clamp_after_decode, field, group, respond_to, version_ordering, Context, Envelope,
    ProtocolFamily, Registrar, Result, StreamField, VersionRecord, UNSUPPORTED,
};
use storeproto_wire::FamilyId;

use super::core;
use crate::error::Status;
use crate::records::{
    check_version, AppItemEntry, AppItemState, Application, ApplicationListItem, Build,
    Configuration, FetchOptions, ListStoreNode, StorageFetchChunk, Structural,
};
use crate::{BLOB_MAX_SIZE, UPLOAD_CHUNK_SIZE, UPLOAD_MAX_SIZE};

pub const ID: FamilyId = storeproto_wire::MAIN;

/// Capabilities of the main family. Sent by the client only.
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
    const FAMILY: &'static str = "main";
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

/// First message on a main connection.
#[derive(Debug, Default, PartialEq)]
pub struct InitRequest {
    pub envelope: Envelope,
    pub main_version: Version,
    pub core_version: core::Version,
}

message!(InitRequest => [
    field!(1, "main_version", main_version),
    group!("versions", |m, _ctx| m.main_version.init_request == Version::INIT_REQUEST, [
        field!(3, "core_version", core_version),
    ]),
]);

impl InitRequest {
    pub fn local() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ListOSesRequest {
    pub envelope: Envelope,
}

message!(ListOSesRequest => []);

#[derive(Debug, Default, PartialEq)]
pub struct ListOSesResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
    pub oses: Vec<String>,
}

message!(ListOSesResponse => [
    field!(1, "error", error),
    field!(2, "message", message),
    field!(3, "oses", oses),
]);

/// Which applications a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AppChoice {
    #[default]
    Owned = b'o',
    Acquired = b'a',
    All = b'A',
}

impl AppChoice {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'o' => Some(Self::Owned),
            b'a' => Some(Self::Acquired),
            b'A' => Some(Self::All),
            _ => None,
        }
    }
}

enum_value!(AppChoice);

#[derive(Debug, Default, PartialEq)]
pub struct ListAppsRequest {
    pub envelope: Envelope,
    pub choice: AppChoice,
}

message!(ListAppsRequest => [field!(1, "choice", choice)]);

#[derive(Debug, Default, PartialEq)]
pub struct ListAppsResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
    pub apps: Vec<ApplicationListItem>,
}

message!(ListAppsResponse => [
    field!(1, "error", error),
    field!(2, "message", message),
    field!(3, "apps", apps),
]);

#[derive(Debug, Default, PartialEq)]
pub struct ListStoreRequest {
    pub envelope: Envelope,
    pub storage_id: String,
    pub path: String,
}

message!(ListStoreRequest => [
    field!(1, "storage_id", storage_id),
    field!(2, "path", path),
]);

#[derive(Debug, PartialEq)]
pub struct ListStoreResponse {
    pub envelope: Envelope,
    pub node_version: u32,
    pub error: Status,
    pub message: String,
    pub nodes: VecDeque<ListStoreNode>,
}

impl Default for ListStoreResponse {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            node_version: ListStoreNode::VERSION,
            error: Status::default(),
            message: String::new(),
            nodes: VecDeque::new(),
        }
    }
}

message!(ListStoreResponse => [
    field!(1, "node_version", node_version),
    field!(2, "error", error),
    field!(3, "message", message),
    field!(4, "nodes", nodes),
], after_decode = |m: &mut ListStoreResponse, _ctx: &Context| {
    check_version::<ListStoreNode>(m.node_version)
});

#[derive(Debug, Default, PartialEq)]
pub struct FetchStoreRequest {
    pub envelope: Envelope,
    pub storage_id: String,
    pub path: String,
    pub offset: u64,
    pub size: u64,
}

message!(FetchStoreRequest => [
    field!(1, "storage_id", storage_id),
    field!(2, "path", path),
    field!(3, "offset", offset),
    field!(4, "size", size),
]);

impl FetchStoreRequest {
    pub fn chunk(&self) -> StorageFetchChunk {
        StorageFetchChunk {
            offset: self.offset,
            size: self.size,
        }
    }
}

/// Storage file contents. The sender fills `data` from a reader; the
/// receiver collects it and checks [`StreamField::is_complete`].
#[derive(Debug, Default, PartialEq)]
pub struct FetchStoreResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
    /// Total size of the file in storage.
    pub size: i64,
    pub chunk: StorageFetchChunk,
    pub data: StreamField,
}

message!(FetchStoreResponse => [
    field!(1, "error", error),
    field!(2, "message", message),
    field!(3, "size", size),
    field!(4, "chunk", chunk),
    group!("data", |m, _ctx| m.error.is_ok(), [
        field!(5, "data", data),
    ]),
]);

#[derive(Debug, Default, PartialEq)]
pub struct FetchAppRequest {
    pub envelope: Envelope,
    pub app_id: String,
    pub os_id: String,
}

message!(FetchAppRequest => [
    field!(1, "app_id", app_id),
    field!(2, "os_id", os_id),
]);

#[derive(Debug, Default, PartialEq)]
pub struct ChangeAppItemStateRequest {
    pub envelope: Envelope,
    pub app_id: String,
    pub os_id: String,
    pub item: AppItemEntry,
    pub new_state: AppItemState,
}

message!(ChangeAppItemStateRequest => [
    field!(1, "app_id", app_id),
    field!(2, "os_id", os_id),
    field!(3, "item", item),
    field!(4, "new_state", new_state),
]);

#[derive(Debug, PartialEq)]
pub struct FetchAppResponse {
    pub envelope: Envelope,
    pub application_version: u32,
    pub error: Status,
    pub message: String,
    pub application: Application,
    pub items: Vec<AppItemEntry>,
}

impl Default for FetchAppResponse {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            application_version: Application::VERSION,
            error: Status::default(),
            message: String::new(),
            application: Application::default(),
            items: Vec::new(),
        }
    }
}

message!(FetchAppResponse => [
    field!(1, "application_version", application_version),
    field!(2, "error", error),
    field!(3, "message", message),
    field!(4, "application", application),
    field!(5, "items", items),
], after_decode = |m: &mut FetchAppResponse, _ctx: &Context| {
    check_version::<Application>(m.application_version)
});

#[derive(Debug, Default, PartialEq)]
pub struct FetchBuildRequest {
    pub envelope: Envelope,
    pub app_id: String,
    pub build_id: String,
}

message!(FetchBuildRequest => [
    field!(1, "app_id", app_id),
    field!(2, "build_id", build_id),
]);

#[derive(Debug, PartialEq)]
pub struct FetchBuildResponse {
    pub envelope: Envelope,
    pub build_version: u32,
    pub error: Status,
    pub message: String,
    pub storage_id: String,
    pub image_blob: Bytes,
    pub build: Build,
}

impl Default for FetchBuildResponse {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            build_version: Build::VERSION,
            error: Status::default(),
            message: String::new(),
            storage_id: String::new(),
            image_blob: Bytes::new(),
            build: Build::default(),
        }
    }
}

message!(FetchBuildResponse => [
    field!(1, "build_version", build_version),
    field!(2, "error", error),
    field!(3, "message", message),
    field!(4, "storage_id", storage_id),
    field!(5, "image_blob", image_blob, max_size = BLOB_MAX_SIZE),
    field!(6, "build", build),
], after_decode = |m: &mut FetchBuildResponse, _ctx: &Context| {
    check_version::<Build>(m.build_version)
});

#[derive(Debug, Default, PartialEq)]
pub struct FetchBuildConfigurationRequest {
    pub envelope: Envelope,
    pub app_id: String,
    pub build_id: String,
    pub lang: String,
    pub os_id: String,
    pub fetch_options: FetchOptions,
    pub properties: Vec<String>,
}

message!(FetchBuildConfigurationRequest => [
    field!(1, "app_id", app_id),
    field!(2, "build_id", build_id),
    field!(3, "lang", lang),
    field!(4, "os_id", os_id),
    field!(5, "fetch_options", fetch_options),
    field!(6, "properties", properties),
]);

#[derive(Debug, PartialEq)]
pub struct FetchBuildConfigurationResponse {
    pub envelope: Envelope,
    pub configuration_version: u32,
    pub error: Status,
    pub message: String,
    pub app_unique: String,
    pub build_unique: String,
    pub build_storage_id: String,
    pub media_storage_id: String,
    pub configuration: Configuration,
    pub image_blob: Bytes,
}

impl Default for FetchBuildConfigurationResponse {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            configuration_version: Configuration::VERSION,
            error: Status::default(),
            message: String::new(),
            app_unique: String::new(),
            build_unique: String::new(),
            build_storage_id: String::new(),
            media_storage_id: String::new(),
            configuration: Configuration::default(),
            image_blob: Bytes::new(),
        }
    }
}

message!(FetchBuildConfigurationResponse => [
    field!(1, "configuration_version", configuration_version),
    field!(2, "error", error),
    field!(3, "message", message),
    field!(4, "app_unique", app_unique),
    field!(5, "build_unique", build_unique),
    field!(6, "build_storage_id", build_storage_id),
    field!(7, "media_storage_id", media_storage_id),
    field!(8, "configuration", configuration),
    field!(9, "image_blob", image_blob, max_size = BLOB_MAX_SIZE),
], after_decode = |m: &mut FetchBuildConfigurationResponse, _ctx: &Context| {
    check_version::<Configuration>(m.configuration_version)
});

#[derive(Debug, Default, PartialEq)]
pub struct FetchBuildUpdatesRequest {
    pub envelope: Envelope,
    pub lang: String,
    pub os_id: String,
    /// (application id, currently installed build unique).
    pub app_ids: Vec<(String, String)>,
}

message!(FetchBuildUpdatesRequest => [
    field!(1, "lang", lang),
    field!(2, "os_id", os_id),
    field!(3, "app_ids", app_ids),
]);

#[derive(Debug, Default, PartialEq)]
pub struct FetchBuildUpdatesResponse {
    pub envelope: Envelope,
    pub error: Status,
    pub message: String,
    /// (application unique, build unique) for every application with a
    /// newer build.
    pub apps: Vec<(String, String)>,
}

message!(FetchBuildUpdatesResponse => [
    field!(1, "error", error),
    field!(2, "message", message),
    field!(3, "apps", apps),
]);

#[derive(Debug, PartialEq)]
pub struct CreateAppRequest {
    pub envelope: Envelope,
    pub application_version: u32,
    pub application: Application,
}

impl Default for CreateAppRequest {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            application_version: Application::VERSION,
            application: Application::default(),
        }
    }
}

message!(CreateAppRequest => [
    field!(1, "application_version", application_version),
    field!(2, "application", application),
], after_decode = |m: &mut CreateAppRequest, _ctx: &Context| {
    check_version::<Application>(m.application_version)
});

#[derive(Debug, PartialEq)]
pub struct CreateBuildRequest {
    pub envelope: Envelope,
    pub build_version: u32,
    pub app_id: String,
    /// Build tag, unique per application.
    pub unique: String,
    pub size: u64,
    pub sha_sum: String,
    pub image_blob: Bytes,
    pub build: Build,
}

impl Default for CreateBuildRequest {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            build_version: Build::VERSION,
            app_id: String::new(),
            unique: String::new(),
            size: 0,
            sha_sum: String::new(),
            image_blob: Bytes::new(),
            build: Build::default(),
        }
    }
}

message!(CreateBuildRequest => [
    field!(1, "build_version", build_version),
    field!(2, "app_id", app_id),
    field!(3, "unique", unique),
    field!(4, "size", size),
    field!(5, "sha_sum", sha_sum),
    field!(6, "image_blob", image_blob, max_size = BLOB_MAX_SIZE),
    field!(7, "build", build),
], after_decode = |m: &mut CreateBuildRequest, _ctx: &Context| {
    check_version::<Build>(m.build_version)
});

#[derive(Debug, Default, PartialEq)]
pub struct CreateMediaRequest {
    pub envelope: Envelope,
    pub app_id: String,
    /// Media tag, unique per application.
    pub unique: String,
    pub size: u64,
    pub sha_sum: String,
}

message!(CreateMediaRequest => [
    field!(1, "app_id", app_id),
    field!(2, "unique", unique),
    field!(3, "size", size),
    field!(4, "sha_sum", sha_sum),
]);

/// One upload window of a build or media archive.
#[derive(Debug, Default, PartialEq)]
pub struct UploadRequest {
    pub envelope: Envelope,
    pub file: StreamField,
}

message!(UploadRequest => [
    field!(1, "file", file, max_size = UPLOAD_MAX_SIZE, chunk_size = UPLOAD_CHUNK_SIZE),
]);

respond_to!(
    InitRequest => core::InitResponse,
    ListOSesRequest => ListOSesResponse,
    ListAppsRequest => ListAppsResponse,
    ListStoreRequest => ListStoreResponse,
    FetchStoreRequest => FetchStoreResponse,
    FetchAppRequest => FetchAppResponse,
    ChangeAppItemStateRequest => FetchAppResponse,
    FetchBuildRequest => FetchBuildResponse,
    FetchBuildConfigurationRequest => FetchBuildConfigurationResponse,
    FetchBuildUpdatesRequest => FetchBuildUpdatesResponse,
    CreateAppRequest => core::Response,
    CreateBuildRequest => core::Response,
    CreateMediaRequest => core::Response,
    UploadRequest => core::Response,
);

/// Main family marker.
pub struct Main;

impl ProtocolFamily for Main {
    const ID: FamilyId = ID;
    const NAME: &'static str = "main";
    type Version = Version;

    fn protocol_table(registrar: &mut Registrar<'_>) -> Result<()> {
        registrar
            .register::<InitRequest>(1)?
            .register::<ListOSesRequest>(2)?
            .register::<ListOSesResponse>(3)?
            .register::<ListAppsRequest>(4)?
            .register::<ListAppsResponse>(5)?
            .register::<ListStoreRequest>(6)?
            .register::<ListStoreResponse>(7)?
            .register::<FetchStoreRequest>(8)?
            .register::<FetchStoreResponse>(9)?
            .register::<CreateBuildRequest>(10)?
            .register::<CreateMediaRequest>(11)?
            .register::<UploadRequest>(12)?
            .register::<FetchAppRequest>(13)?
            .register::<FetchAppResponse>(14)?
            .register::<ChangeAppItemStateRequest>(15)?
            .register::<FetchBuildRequest>(16)?
            .register::<FetchBuildResponse>(17)?
            .register::<FetchBuildConfigurationRequest>(18)?
            .register::<FetchBuildConfigurationResponse>(19)?
            .register::<FetchBuildUpdatesRequest>(20)?
            .register::<FetchBuildUpdatesResponse>(21)?
            .register::<CreateAppRequest>(22)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeproto_schema::{decode, encode, SchemaError};

    #[test]
    fn structural_version_mismatch_fails_decode() {
        let ctx = Context::new();
        let request = CreateAppRequest {
            application_version: Application::VERSION + 1,
            application: Application {
                name: "editor".into(),
            },
            ..CreateAppRequest::default()
        };
        let body = encode(&request, &ctx).unwrap();
        let err = decode::<CreateAppRequest>(&body, &ctx).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::StructuralVersion {
                record: "Application",
                expected: 1,
                found: 2,
            }
        ));
    }

    #[test]
    fn failed_fetch_carries_no_data() {
        let ctx = Context::new();
        let response = FetchStoreResponse {
            error: Status(7),
            message: "no such file".into(),
            data: StreamField::from_bytes(&b"ignored"[..]),
            ..FetchStoreResponse::default()
        };
        let body = encode(&response, &ctx).unwrap();
        let decoded = decode::<FetchStoreResponse>(&body, &ctx).unwrap();
        assert_eq!(decoded.error, Status(7));
        assert_eq!(decoded.data.received(), 0);
        assert!(!decoded.data.is_complete());
    }

    #[test]
    fn fetch_store_streams_data() {
        let ctx = Context::new();
        let request = FetchStoreRequest {
            offset: 10,
            size: 5,
            ..FetchStoreRequest::default()
        };
        let mut response = FetchStoreResponse::from(&request);
        response.error = Status::OK;
        response.size = 15;
        response.chunk = request.chunk();
        response.data = StreamField::from_bytes(&b"world"[..]);

        let body = encode(&response, &ctx).unwrap();
        let decoded = decode::<FetchStoreResponse>(&body, &ctx).unwrap();
        assert!(decoded.data.is_complete());
        assert_eq!(decoded.data.data(), b"world");
        assert_eq!(decoded.chunk.end(), 15);
    }

    #[test]
    fn upload_is_capped() {
        let ctx = Context::new();
        let request = UploadRequest {
            file: StreamField::from_bytes(vec![0u8; UPLOAD_MAX_SIZE as usize + 1]),
            ..UploadRequest::default()
        };
        assert!(encode(&request, &ctx).unwrap_err().is_bound_exceeded());
    }

    #[test]
    fn app_choice_rejects_unknown_bytes() {
        let mut out = storeproto_schema::WireWriter::new();
        out.put_key(1, storeproto_schema::WireType::Varint).unwrap();
        out.put_varint(u64::from(b'z'));
        assert!(decode::<ListAppsRequest>(out.as_slice(), &Context::new()).is_err());

        let ctx = Context::new();
        let request = ListAppsRequest {
            choice: AppChoice::All,
            ..ListAppsRequest::default()
        };
        let body = encode(&request, &ctx).unwrap();
        assert_eq!(decode::<ListAppsRequest>(&body, &ctx).unwrap().choice, AppChoice::All);
    }
}
