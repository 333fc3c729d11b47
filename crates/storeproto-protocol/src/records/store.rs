use serde::{Deserialize, Serialize};
use storeproto_schema::field;

use super::Structural;

/// A file or directory in a storage listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListStoreNode {
    pub name: String,
    pub size: u64,
}

impl ListStoreNode {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

record!(ListStoreNode => [
    field!(1, "name", name),
    field!(2, "size", size),
]);

impl Structural for ListStoreNode {
    const VERSION: u32 = 1;
}

/// Byte range of a storage file served by one fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFetchChunk {
    pub offset: u64,
    pub size: u64,
}

impl StorageFetchChunk {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

record!(StorageFetchChunk => [
    field!(1, "offset", offset),
    field!(2, "size", size),
]);

impl Structural for StorageFetchChunk {
    const VERSION: u32 = 1;
}
