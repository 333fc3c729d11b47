//! Wire-visible error taxonomy.
//!
//! Responses carry a bare `u32` code; peers render it through
//! [`make_error`]. Codes are append-only: a value, once shipped, keeps its
//! meaning forever.

use std::fmt;

use serde::Serialize;
use storeproto_schema::{Context, FieldMeta, Result, WireReader, WireType, WireValue, WireWriter};

pub const CATEGORY: &str = "storeproto";

macro_rules! error_codes {
    ($($variant:ident = $value:literal => $text:literal,)+) => {
        /// Stable numeric error codes. Add new codes at the end only.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[repr(u32)]
        pub enum ErrorCode {
            $($variant = $value,)+
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$variant,)+];

            pub fn from_u32(code: u32) -> Option<Self> {
                match code {
                    $($value => Some(ErrorCode::$variant),)+
                    _ => None,
                }
            }

            /// Human-readable description.
            pub fn text(self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $text,)+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

error_codes! {
    Generic = 1 => "Generic",
    Exist = 2 => "Exist",
    Backend = 3 => "Backend unavailable",
    Pending = 4 => "Operation pending",
    Version = 5 => "Version mismatch",
    State = 6 => "Invalid state",
    RequestInvalid = 7 => "Request invalid",
    AuthenticationInvalid = 8 => "Authentication: Invalid",
    AuthenticationValidate = 9 => "Authentication: Validate required",
    AuthenticationLocked = 10 => "Authentication: Locked",
    AuthenticationWait = 11 => "Authentication: Wait",
    AuthenticationRelogin = 12 => "Authentication: Relogin",
    AuthenticationDemo = 13 => "Authentication: No demo slot available",
    AuthenticationDemoInvalid = 14 => "Authentication: Demo not supported",
    AuthenticationConnectionCount = 15 => "Authentication: Connection count",
    AccountInvalid = 16 => "Account: Invalid",
    AccountApplicationQuota = 17 => "Account: Application count quota exceeded",
    AccountStorageQuota = 18 => "Account: Storage quota exceeded",
    AccountNoReservation = 19 => "Account: No reservation",
    Storage = 20 => "Storage",
    StorageLimit = 21 => "Storage: Limit",
    StorageSum = 22 => "Storage: Sum",
    StorageZip = 23 => "Storage: Zip",
    StorageSize = 24 => "Storage: Size",
    StorageInvalid = 25 => "Storage: Invalid",
    ApplicationInvalid = 26 => "Application: Invalid",
    ApplicationReservation = 27 => "Application: Reservation",
    ApplicationSystem = 28 => "Application: System",
    Retry = 29 => "Retry",
    ArgumentInvalid = 30 => "Invalid argument",
    RequestCount = 31 => "Request count",
}

impl ErrorCode {
    /// Code carried by successful responses.
    pub const SUCCESS: u32 = 0;

    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&make_error(self.code()), f)
    }
}

/// A code bound to the storeproto category, ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("({}:{}): {}", CATEGORY, .code, condition_text(.code))]
pub struct ErrorCondition {
    code: u32,
}

impl ErrorCondition {
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn category(&self) -> &'static str {
        CATEGORY
    }

    pub fn is_success(&self) -> bool {
        self.code == ErrorCode::SUCCESS
    }

    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.code)
    }

    pub fn message(&self) -> &'static str {
        match self.kind() {
            _ if self.is_success() => "Success",
            Some(code) => code.text(),
            None => "Unknown",
        }
    }
}

impl From<ErrorCode> for ErrorCondition {
    fn from(code: ErrorCode) -> Self {
        make_error(code.code())
    }
}

pub fn make_error(code: u32) -> ErrorCondition {
    ErrorCondition { code }
}

fn condition_text(code: &u32) -> &'static str {
    make_error(*code).message()
}

/// The `error` field of a response.
///
/// Defaults to [`Status::UNSET`] so a response whose error field was gated
/// out never reads as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u32);

impl Status {
    pub const OK: Status = Status(ErrorCode::SUCCESS);
    pub const UNSET: Status = Status(u32::MAX);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }

    pub fn condition(self) -> ErrorCondition {
        make_error(self.0)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::UNSET
    }
}

impl From<ErrorCode> for Status {
    fn from(code: ErrorCode) -> Self {
        Status(code.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            fmt::Display::fmt(&self.condition(), f)
        } else {
            f.write_str("unset")
        }
    }
}

impl WireValue for Status {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context) -> Result<()> {
        self.0.encode_body(out, meta, ctx)
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()> {
        self.0.decode_body(input, meta, ctx)
    }
}
