use serde::{Deserialize, Serialize};
use storeproto_schema::field;

use super::{check_hash, Structural};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
}

impl Application {
    /// Cheap fingerprint for detecting a changed application record.
    pub fn compute_check(&self) -> u64 {
        check_hash(self.name.as_str())
    }
}

record!(Application => [field!(1, "name", name)]);

impl Structural for Application {
    const VERSION: u32 = 1;
}

/// One row of an application listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationListItem {
    pub id: String,
    pub unique: String,
    pub name: String,
}

impl ApplicationListItem {
    pub fn new(id: impl Into<String>, unique: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unique: unique.into(),
            name: name.into(),
        }
    }
}

record!(ApplicationListItem => [
    field!(1, "id", id),
    field!(2, "unique", unique),
    field!(3, "name", name),
]);

impl Structural for ApplicationListItem {
    const VERSION: u32 = 1;
}
