//! App-store protocol for storeproto.
//!
//! Three families share one connection:
//!
//! - [`families::core`] (id 0): init replies, login, generic responses
//! - [`families::auth`] (id 1): account creation and maintenance
//! - [`families::main`] (id 2): applications, builds, media and storage
//!
//! Domain records nested in messages live in [`records`]; their
//! persisted form is handled by [`archive`]. Wire-visible result codes are
//! in [`error`].
//!
//! ```ignore
//! use storeproto_protocol::{build_registry, families::main, local_context};
//!
//! let registry = build_registry()?;
//! let ctx = local_context();
//! let (key, body) = registry.encode(&main::ListOSesRequest::default(), &ctx)?;
//! ```

#[macro_use]
mod macros;

pub mod archive;
pub mod error;
pub mod families;
pub mod records;
pub mod secret;

use storeproto_schema::{
    configure_protocol, Context, RegistryConfig, Result, TypeRegistry, VersionRecord,
};

pub use archive::ArchiveError;
pub use error::{make_error, ErrorCode, ErrorCondition, Status, CATEGORY};
pub use families::{Auth, Core, Main};
pub use secret::Secret;

/// Bound on image and captcha blobs.
pub const BLOB_MAX_SIZE: u64 = 1024 * 1024;

/// Bound on one upload request's file stream.
pub const UPLOAD_MAX_SIZE: u64 = 100 * 1024;

/// Chunk ceiling for upload streams.
pub const UPLOAD_CHUNK_SIZE: usize = 100 * 1024;

/// Register core, auth and main into `registry`.
pub fn configure_all(registry: &mut TypeRegistry) -> Result<()> {
    configure_protocol::<Core>(registry)?;
    configure_protocol::<Auth>(registry)?;
    configure_protocol::<Main>(registry)?;
    Ok(())
}

/// A registry holding every family, with default limits.
pub fn build_registry() -> Result<TypeRegistry> {
    build_registry_with_config(RegistryConfig::default())
}

pub fn build_registry_with_config(config: RegistryConfig) -> Result<TypeRegistry> {
    let mut registry = TypeRegistry::with_config(config);
    configure_all(&mut registry)?;
    Ok(registry)
}

/// A context in which every family negotiated this build's own versions.
pub fn local_context() -> Context {
    Context::new()
        .with_negotiated(families::core::Version::local())
        .with_negotiated(families::auth::Version::local())
        .with_negotiated(families::main::Version::local())
}
