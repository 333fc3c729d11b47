use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountState {
    #[default]
    Invalid = 0,
    Inactive = 1,
    Validate = 2,
    Active = 3,
    ActiveLocked = 4,
    ValidateLocked = 5,
}

impl AccountState {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Invalid,
            1 => Self::Inactive,
            2 => Self::Validate,
            3 => Self::Active,
            4 => Self::ActiveLocked,
            5 => Self::ValidateLocked,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Inactive => "inactive",
            Self::Validate => "validate",
            Self::Active => "active",
            Self::ActiveLocked => "active_locked",
            Self::ValidateLocked => "validate_locked",
        }
    }

    pub fn is_locked(self) -> bool {
        matches!(self, Self::ActiveLocked | Self::ValidateLocked)
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum_value!(AccountState);
