use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use storeproto_schema::{
    field, Context, FieldMeta, Record, Result, WireReader, WireType, WireValue, WireWriter,
};
use storeproto_wire::WireError;

use super::{check_hash, Structural};

/// Parts of a build configuration a client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FetchOption {
    Name = 0,
    Directory = 1,
    Flags = 2,
    OSes = 3,
    Mounts = 4,
    EXEs = 5,
    Shortcuts = 6,
    Image = 7,
    Media = 8,
}

impl FetchOption {
    pub const ALL: [FetchOption; 9] = [
        Self::Name,
        Self::Directory,
        Self::Flags,
        Self::OSes,
        Self::Mounts,
        Self::EXEs,
        Self::Shortcuts,
        Self::Image,
        Self::Media,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Directory => "directory",
            Self::Flags => "flags",
            Self::OSes => "oses",
            Self::Mounts => "mounts",
            Self::EXEs => "exes",
            Self::Shortcuts => "shortcuts",
            Self::Image => "image",
            Self::Media => "media",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|option| option.name().eq_ignore_ascii_case(name))
    }

    fn bit(self) -> u16 {
        1 << self as u8
    }
}

/// Bitset over [`FetchOption`], encoded as one varint.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchOptions(u16);

impl FetchOptions {
    const MASK: u16 = (1 << FetchOption::ALL.len()) - 1;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(Self::MASK)
    }

    pub fn with(mut self, option: FetchOption) -> Self {
        self.set(option);
        self
    }

    pub fn set(&mut self, option: FetchOption) {
        self.0 |= option.bit();
    }

    pub fn reset(&mut self, option: FetchOption) {
        self.0 &= !option.bit();
    }

    pub fn has(&self, option: FetchOption) -> bool {
        self.0 & option.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = FetchOption> + '_ {
        FetchOption::ALL
            .into_iter()
            .filter(move |option| self.has(*option))
    }
}

impl FromIterator<FetchOption> for FetchOptions {
    fn from_iter<I: IntoIterator<Item = FetchOption>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(FetchOption::name)).finish()
    }
}

impl WireValue for FetchOptions {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn encode_body(&self, out: &mut WireWriter, _meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        out.put_varint(u64::from(self.0));
        Ok(())
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        let raw = input.get_varint()?;
        if raw & !u64::from(Self::MASK) != 0 {
            return Err(WireError::InvalidValue {
                tag: meta.tag,
                reason: format!("fetch options {raw:#x} set unknown bits"),
            }
            .into());
        }
        self.0 = raw as u16;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    pub command: String,
    pub arguments: String,
    pub run_folder: String,
    pub icon: String,
}

record!(Shortcut => [
    field!(1, "name", name),
    field!(2, "command", command),
    field!(3, "arguments", arguments),
    field!(4, "run_folder", run_folder),
    field!(5, "icon", icon),
]);

impl Structural for Shortcut {
    const VERSION: u32 = 1;
}

/// A thumbnail and the full-size item it previews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub thumbnail_path: String,
    pub path: String,
}

impl MediaEntry {
    pub fn new(thumbnail_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            thumbnail_path: thumbnail_path.into(),
            path: path.into(),
        }
    }
}

record!(MediaEntry => [
    field!(1, "thumbnail_path", thumbnail_path),
    field!(2, "path", path),
]);

impl Structural for MediaEntry {
    const VERSION: u32 = 1;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub name: String,
    pub entries: Vec<MediaEntry>,
}

impl Media {
    /// Fingerprint over the name length and entry count.
    pub fn compute_check(&self) -> u64 {
        (self.name.len() ^ self.entries.len()) as u64
    }
}

record!(Media => [
    field!(1, "name", name),
    field!(2, "entries", entries),
]);

impl Structural for Media {
    const VERSION: u32 = 1;

    fn collect_versions(out: &mut BTreeMap<String, u32>) {
        out.insert(Self::NAME.to_string(), Self::VERSION);
        MediaEntry::collect_versions(out);
    }
}

/// Configuration flag bit: install into a hidden directory.
pub const HIDDEN_DIRECTORY: u64 = 1 << 0;

/// Flag names indexed by bit position.
pub const CONFIGURATION_FLAG_NAMES: &[&str] = &["HiddenDirectory"];

/// One installable variant of a build (per OS family, say).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub directory: String,
    pub flags: u64,
    pub oses: Vec<String>,
    pub mounts: Vec<(String, String)>,
    pub exes: Vec<String>,
    pub shortcuts: VecDeque<Shortcut>,
    pub properties: Vec<(String, String)>,
    pub media: Media,
}

impl Configuration {
    /// Bit of the flag called `name` (case-insensitive), or 0 if unknown.
    pub fn flag(name: &str) -> u64 {
        CONFIGURATION_FLAG_NAMES
            .iter()
            .position(|flag| flag.eq_ignore_ascii_case(name))
            .map_or(0, |bit| 1 << bit)
    }

    pub fn flag_names(flags: u64) -> Vec<&'static str> {
        CONFIGURATION_FLAG_NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| flags & (1 << bit) != 0)
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn compute_flags<'a>(names: impl IntoIterator<Item = &'a str>) -> u64 {
        names.into_iter().fold(0, |flags, name| flags | Self::flag(name))
    }

    pub fn has_hidden_directory(&self) -> bool {
        self.flags & HIDDEN_DIRECTORY != 0
    }
}

record!(Configuration => [
    field!(1, "name", name),
    field!(2, "directory", directory),
    field!(3, "flags", flags),
    field!(4, "oses", oses),
    field!(5, "mounts", mounts),
    field!(6, "exes", exes),
    field!(7, "shortcuts", shortcuts),
    field!(8, "properties", properties),
    field!(9, "media", media),
]);

impl Structural for Configuration {
    const VERSION: u32 = 1;

    fn collect_versions(out: &mut BTreeMap<String, u32>) {
        out.insert(Self::NAME.to_string(), Self::VERSION);
        Shortcut::collect_versions(out);
        Media::collect_versions(out);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub name: String,
    pub tag: String,
    pub dictionary: VecDeque<(String, String)>,
    pub properties: Vec<(String, String)>,
    /// Presentation order.
    pub configurations: VecDeque<Configuration>,
}

impl Build {
    /// Fingerprint over name, tag and the sizes of the collections. Nested
    /// configurations contribute only their count.
    pub fn compute_check(&self) -> u64 {
        check_hash(self.name.as_str())
            ^ check_hash(self.tag.as_str())
            ^ self.dictionary.len() as u64
            ^ self.properties.len() as u64
            ^ self.configurations.len() as u64
    }
}

record!(Build => [
    field!(1, "name", name),
    field!(2, "tag", tag),
    field!(3, "dictionary", dictionary),
    field!(4, "properties", properties),
    field!(5, "configurations", configurations),
]);

impl Structural for Build {
    const VERSION: u32 = 1;

    fn collect_versions(out: &mut BTreeMap<String, u32>) {
        out.insert(Self::NAME.to_string(), Self::VERSION);
        Configuration::collect_versions(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeproto_schema::Context;

    fn sample_build() -> Build {
        Build {
            name: "editor".into(),
            tag: "1.2.0".into(),
            dictionary: VecDeque::from([("en".into(), "Editor".into())]),
            properties: vec![("channel".into(), "beta".into())],
            configurations: VecDeque::from([Configuration {
                name: "linux".into(),
                directory: "editor".into(),
                flags: HIDDEN_DIRECTORY,
                oses: vec!["Linux64".into()],
                mounts: vec![("bin".into(), "/opt/editor/bin".into())],
                exes: vec!["bin/editor".into()],
                shortcuts: VecDeque::from([Shortcut {
                    name: "Editor".into(),
                    command: "bin/editor".into(),
                    icon: "editor.png".into(),
                    ..Shortcut::default()
                }]),
                properties: Vec::new(),
                media: Media {
                    name: "screens".into(),
                    entries: vec![MediaEntry::new("a_t.png", "a.png")],
                },
            }]),
        }
    }

    #[test]
    fn nested_build_roundtrips() {
        let build = sample_build();
        let ctx = Context::new();
        let mut out = WireWriter::new();
        Build::schema().encode(&build, &mut out, &ctx).unwrap();

        let mut decoded = Build::default();
        Build::schema()
            .decode(&mut decoded, out.as_slice(), &ctx)
            .unwrap();
        assert_eq!(decoded, build);
    }

    #[test]
    fn fetch_options_bitset() {
        let options: FetchOptions = [FetchOption::Name, FetchOption::Media].into_iter().collect();
        assert!(options.has(FetchOption::Media));
        assert!(!options.has(FetchOption::Image));
        assert_eq!(options.bits(), 0b1_0000_0001);
        assert_eq!(format!("{options:?}"), r#"{"name", "media"}"#);
        assert_eq!(FetchOption::from_name("OSES"), Some(FetchOption::OSes));
        assert_eq!(FetchOptions::all().iter().count(), 9);

        let mut cleared = options;
        cleared.reset(FetchOption::Name);
        assert_eq!(cleared.iter().collect::<Vec<_>>(), vec![FetchOption::Media]);
    }

    #[test]
    fn fetch_options_reject_unknown_bits() {
        let meta = FieldMeta::new(5, "fetch_options");
        let mut out = WireWriter::new();
        out.put_varint(1 << 12);
        let mut options = FetchOptions::default();
        let err = options
            .decode_body(&mut WireReader::new(out.as_slice()), &meta, &Context::new())
            .unwrap_err();
        assert!(matches!(
            err,
            storeproto_schema::SchemaError::Wire(WireError::InvalidValue { tag: 5, .. })
        ));
    }

    #[test]
    fn configuration_flags_by_name() {
        assert_eq!(Configuration::flag("hiddendirectory"), HIDDEN_DIRECTORY);
        assert_eq!(Configuration::flag("unknown"), 0);
        assert_eq!(
            Configuration::compute_flags(["HiddenDirectory", "nope"]),
            HIDDEN_DIRECTORY
        );
        assert_eq!(
            Configuration::flag_names(HIDDEN_DIRECTORY),
            vec!["HiddenDirectory"]
        );
        assert!(sample_build().configurations[0].has_hidden_directory());
    }

    #[test]
    fn build_versions_cover_nested_records() {
        let versions = Build::versions();
        let names: Vec<_> = versions.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["Build", "Configuration", "Media", "MediaEntry", "Shortcut"]
        );
    }

    #[test]
    fn check_tracks_shape_changes() {
        let build = sample_build();
        let before = build.compute_check();
        assert_eq!(before, sample_build().compute_check());

        let mut grown = build.clone();
        grown.properties.push(("arch".into(), "x86_64".into()));
        assert_ne!(grown.compute_check(), before);

        let media = Media {
            name: "shots".into(),
            entries: vec![MediaEntry::default()],
        };
        assert_eq!(media.compute_check(), 5 ^ 1);
    }
}
