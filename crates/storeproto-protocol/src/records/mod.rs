//! Domain records carried inside messages.
//!
//! Records evolve independently of the connection: each has a structural
//! version that is written next to it (a `*_version` field on the message,
//! or the archive envelope) and must match the compiled-in value on read.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::Serialize;
use storeproto_schema::{check_structural, Record};

mod account;
mod application;
mod build;
mod item;
mod store;

pub use account::AccountState;
pub use application::{Application, ApplicationListItem};
pub use build::{
    Build, Configuration, FetchOption, FetchOptions, Media, MediaEntry, Shortcut,
    CONFIGURATION_FLAG_NAMES, HIDDEN_DIRECTORY,
};
pub use item::{
    is_default_name, is_default_public_name, AppItemEntry, AppItemFlag, AppItemKind,
    AppItemState, FLAGS_BITS, KIND_BITS, STATE_BITS,
};
pub use store::{ListStoreNode, StorageFetchChunk};

/// A record with a structural version.
pub trait Structural: Record + Clone + PartialEq + Serialize + DeserializeOwned {
    const VERSION: u32;

    /// Record this type's version and the versions of every record type
    /// nested in it.
    fn collect_versions(out: &mut BTreeMap<String, u32>) {
        out.insert(Self::NAME.to_string(), Self::VERSION);
    }

    fn versions() -> BTreeMap<String, u32> {
        let mut out = BTreeMap::new();
        Self::collect_versions(&mut out);
        out
    }
}

/// Check a structural version read from the wire against `R`'s.
pub fn check_version<R: Structural>(found: u32) -> storeproto_schema::Result<()> {
    check_structural(R::NAME, R::VERSION, found)
}

/// Hash of `value` for quick change checks. Stable within one build, not
/// across toolchains, so never persist it.
pub(crate) fn check_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
