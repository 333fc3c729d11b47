//! Per-connection negotiated state consulted by schema predicates.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::version::VersionRecord;

/// Negotiated version records of one connection, keyed by record type.
///
/// A connection fills this once during the init handshake and only reads it
/// afterwards; schema walks never mutate it.
#[derive(Default)]
pub struct Context {
    versions: HashMap<TypeId, (&'static str, Box<dyn Any + Send + Sync>)>,
    log_unknown_tags: bool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the negotiated record for `V`'s family.
    pub fn set_negotiated<V: VersionRecord>(&mut self, version: V) {
        self.versions
            .insert(TypeId::of::<V>(), (V::FAMILY, Box::new(version)));
    }

    /// Builder form of [`Context::set_negotiated`].
    pub fn with_negotiated<V: VersionRecord>(mut self, version: V) -> Self {
        self.set_negotiated(version);
        self
    }

    /// The negotiated record for `V`'s family, if one was installed.
    pub fn negotiated<V: VersionRecord>(&self) -> Option<&V> {
        self.versions
            .get(&TypeId::of::<V>())
            .and_then(|(_, boxed)| boxed.downcast_ref::<V>())
    }

    /// The negotiated record, or this build's local record when none was
    /// installed yet.
    pub fn negotiated_or_local<V: VersionRecord>(&self) -> V {
        self.negotiated::<V>().cloned().unwrap_or_else(V::local)
    }

    pub fn has_negotiated<V: VersionRecord>(&self) -> bool {
        self.versions.contains_key(&TypeId::of::<V>())
    }

    /// Families with an installed record, sorted by name.
    pub fn families(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.versions.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Log tags a decoder skipped at debug instead of trace level.
    pub fn set_log_unknown_tags(&mut self, enabled: bool) {
        self.log_unknown_tags = enabled;
    }

    pub fn log_unknown_tags(&self) -> bool {
        self.log_unknown_tags
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("families", &self.families())
            .field("log_unknown_tags", &self.log_unknown_tags)
            .finish()
    }
}
