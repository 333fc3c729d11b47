//! Application items: the builds and media of an application and their
//! release state.

use std::fmt;

use serde::{Deserialize, Serialize};
use storeproto_schema::field;

use super::Structural;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AppItemState {
    #[default]
    Invalid = 0,
    Trash = 1,
    PrivateAlpha = 2,
    ReviewRequest = 3,
    ReviewStarted = 4,
    ReviewAccepted = 5,
    ReviewRejected = 6,
    PublicAlpha = 7,
    PublicBeta = 8,
    PublicRelease = 9,
}

impl AppItemState {
    pub const ALL: [AppItemState; 10] = [
        Self::Invalid,
        Self::Trash,
        Self::PrivateAlpha,
        Self::ReviewRequest,
        Self::ReviewStarted,
        Self::ReviewAccepted,
        Self::ReviewRejected,
        Self::PublicAlpha,
        Self::PublicBeta,
        Self::PublicRelease,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "none",
            Self::Trash => "trash",
            Self::PrivateAlpha => "private_alpha",
            Self::ReviewRequest => "review_request",
            Self::ReviewStarted => "review_started",
            Self::ReviewAccepted => "review_accepted",
            Self::ReviewRejected => "review_rejected",
            Self::PublicAlpha => "public_alpha",
            Self::PublicBeta => "public_beta",
            Self::PublicRelease => "public_release",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.name() == name)
    }

    pub fn is_public(self) -> bool {
        matches!(
            self,
            Self::PublicAlpha | Self::PublicBeta | Self::PublicRelease
        )
    }
}

impl fmt::Display for AppItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum_value!(AppItemState);

/// True for the names of the public release states.
pub fn is_default_public_name(name: &str) -> bool {
    AppItemState::from_name(name).is_some_and(AppItemState::is_public)
}

/// True for state names a user may not pick as a custom item name.
pub fn is_default_name(name: &str) -> bool {
    is_default_public_name(name)
        || matches!(
            AppItemState::from_name(name),
            Some(AppItemState::Invalid | AppItemState::Trash | AppItemState::PrivateAlpha)
        )
}

/// Review flags, stored as bit positions in [`AppItemEntry::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AppItemFlag {
    ReviewAccepted = 0,
    ReviewRejected = 1,
}

impl AppItemFlag {
    pub fn name(self) -> &'static str {
        match self {
            Self::ReviewAccepted => "ReviewAccepted",
            Self::ReviewRejected => "ReviewRejected",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::ReviewAccepted, Self::ReviewRejected]
            .into_iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(name))
    }

    fn bit(self) -> u64 {
        1 << self as u8
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AppItemKind {
    #[default]
    Build = 0,
    Media = 1,
}

impl AppItemKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Build),
            1 => Some(Self::Media),
            _ => None,
        }
    }
}

pub const STATE_BITS: u32 = 8;
pub const KIND_BITS: u32 = 4;
pub const FLAGS_BITS: u32 = 52;

const STATE_MASK: u64 = (1 << STATE_BITS) - 1;
const KIND_MASK: u64 = (1 << KIND_BITS) - 1;
const FLAGS_MASK: u64 = (1 << FLAGS_BITS) - 1;
const KIND_SHIFT: u32 = STATE_BITS;
const FLAGS_SHIFT: u32 = STATE_BITS + KIND_BITS;

/// A named item with state, kind and flags packed into one word.
///
/// Layout, least significant bit first: state in bits 0..8, kind in
/// 8..12, flags in 12..64. The word is what travels on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppItemEntry {
    pub name: String,
    pub value: u64,
}

impl AppItemEntry {
    pub fn new(name: impl Into<String>, state: AppItemState) -> Self {
        let mut entry = Self {
            name: name.into(),
            value: 0,
        };
        entry.set_state(state);
        entry
    }

    /// Pack raw state, kind and flags. Out-of-range bits are dropped.
    pub const fn pack(state: u8, kind: u8, flags: u64) -> u64 {
        (state as u64 & STATE_MASK)
            | ((kind as u64 & KIND_MASK) << KIND_SHIFT)
            | ((flags & FLAGS_MASK) << FLAGS_SHIFT)
    }

    /// Split a packed word into raw (state, kind, flags).
    pub const fn unpack(value: u64) -> (u8, u8, u64) {
        (
            (value & STATE_MASK) as u8,
            ((value >> KIND_SHIFT) & KIND_MASK) as u8,
            value >> FLAGS_SHIFT,
        )
    }

    pub fn raw_state(&self) -> u8 {
        Self::unpack(self.value).0
    }

    /// `None` when the word holds a state this build does not know.
    pub fn state(&self) -> Option<AppItemState> {
        AppItemState::from_u8(self.raw_state())
    }

    pub fn set_state(&mut self, state: AppItemState) {
        let (_, kind, flags) = Self::unpack(self.value);
        self.value = Self::pack(state as u8, kind, flags);
    }

    pub fn kind(&self) -> Option<AppItemKind> {
        AppItemKind::from_u8(Self::unpack(self.value).1)
    }

    pub fn set_kind(&mut self, kind: AppItemKind) {
        let (state, _, flags) = Self::unpack(self.value);
        self.value = Self::pack(state, kind as u8, flags);
    }

    pub fn flags(&self) -> u64 {
        Self::unpack(self.value).2
    }

    pub fn set_flags(&mut self, flags: u64) {
        let (state, kind, _) = Self::unpack(self.value);
        self.value = Self::pack(state, kind, flags);
    }

    pub fn set_flag(&mut self, flag: AppItemFlag) {
        self.set_flags(self.flags() | flag.bit());
    }

    pub fn reset_flag(&mut self, flag: AppItemFlag) {
        self.set_flags(self.flags() & !flag.bit());
    }

    pub fn is_flag_set(&self, flag: AppItemFlag) -> bool {
        self.flags() & flag.bit() != 0
    }
}

record!(AppItemEntry => [
    field!(1, "name", name),
    field!(2, "value", value),
]);

impl Structural for AppItemEntry {
    const VERSION: u32 = 1;
}
