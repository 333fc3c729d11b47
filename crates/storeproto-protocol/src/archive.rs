//! Persisted form of domain records.
//!
//! An archive is a JSON document:
//!
//! ```json
//! { "kind": "Build", "versions": { "Build": 1, "Configuration": 1 }, "value": { ... } }
//! ```
//!
//! `versions` lists the record and every record type nested in it. Archives
//! are written and read by the same build, so any version difference is
//! data corruption and loading fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::Structural;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive holds a {found}, expected a {expected}")]
    Kind {
        expected: &'static str,
        found: String,
    },

    /// `found` is 0 when the archive does not list the record.
    #[error("{record}: archived structural version {found}, this build reads {expected}")]
    StructuralVersion {
        record: String,
        expected: u32,
        found: u32,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Serialize)]
struct ArchiveRef<'a, T> {
    kind: &'static str,
    versions: BTreeMap<String, u32>,
    value: &'a T,
}

#[derive(Deserialize)]
struct ArchiveOwned {
    kind: String,
    #[serde(default)]
    versions: BTreeMap<String, u32>,
    value: serde_json::Value,
}

/// Serialize `record` together with its structural versions.
pub fn store<T: Structural>(record: &T) -> Result<Vec<u8>> {
    let archive = ArchiveRef {
        kind: T::NAME,
        versions: T::versions(),
        value: record,
    };
    Ok(serde_json::to_vec(&archive)?)
}

/// Read a record written by [`store`].
///
/// Versions are checked before the value is interpreted, so a layout change
/// reports as a version mismatch and not as a JSON shape error.
pub fn load<T: Structural>(bytes: &[u8]) -> Result<T> {
    let archive: ArchiveOwned = serde_json::from_slice(bytes)?;
    if archive.kind != T::NAME {
        return Err(ArchiveError::Kind {
            expected: T::NAME,
            found: archive.kind,
        });
    }

    let expected = T::versions();
    for (record, &version) in &expected {
        let found = archive.versions.get(record).copied().unwrap_or(0);
        if found != version {
            return Err(mismatch(record, version, found));
        }
    }
    if let Some((record, &found)) = archive
        .versions
        .iter()
        .find(|(record, _)| !expected.contains_key(*record))
    {
        return Err(mismatch(record, 0, found));
    }

    Ok(serde_json::from_value(archive.value)?)
}

fn mismatch(record: &str, expected: u32, found: u32) -> ArchiveError {
    tracing::error!(record, expected, found, "archived structural version mismatch");
    ArchiveError::StructuralVersion {
        record: record.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::records::{Application, Build, Configuration, Shortcut};

    fn sample_build() -> Build {
        let mut configuration = Configuration {
            name: "default".into(),
            directory: "editor".into(),
            oses: vec!["linux".into()],
            ..Configuration::default()
        };
        configuration.shortcuts.push_back(Shortcut {
            name: "Editor".into(),
            command: "bin/editor".into(),
            ..Shortcut::default()
        });
        Build {
            name: "1.0".into(),
            tag: "stable".into(),
            configurations: VecDeque::from([configuration]),
            ..Build::default()
        }
    }

    #[test]
    fn stored_build_loads_back() {
        let build = sample_build();
        let bytes = store(&build).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["kind"], "Build");
        assert_eq!(doc["versions"]["Shortcut"], 1);
        assert_eq!(load::<Build>(&bytes).unwrap(), build);
    }

    #[test]
    fn nested_version_mismatch_is_rejected() {
        let bytes = store(&sample_build()).unwrap();
        let mut doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        doc["versions"]["Configuration"] = 2.into();
        let err = load::<Build>(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::StructuralVersion { ref record, expected: 1, found: 2 } if record == "Configuration"
        ));
    }

    #[test]
    fn missing_version_reads_as_zero() {
        let doc = serde_json::json!({ "kind": "Application", "value": { "name": "x" } });
        let err = load::<Application>(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::StructuralVersion { expected: 1, found: 0, .. }
        ));
    }

    #[test]
    fn unknown_nested_record_is_rejected() {
        let doc = serde_json::json!({
            "kind": "Application",
            "versions": { "Application": 1, "Icon": 1 },
            "value": { "name": "x" },
        });
        let err = load::<Application>(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::StructuralVersion { ref record, expected: 0, found: 1 } if record == "Icon"
        ));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let bytes = store(&Application { name: "x".into() }).unwrap();
        assert!(matches!(
            load::<Build>(&bytes).unwrap_err(),
            ArchiveError::Kind { expected: "Build", .. }
        ));
        assert!(matches!(
            load::<Build>(b"not json").unwrap_err(),
            ArchiveError::Json(_)
        ));
    }
}
