use std::fmt;
use std::io;

use storeproto_schema::SchemaError;
use storeproto_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(DATA_INVALID, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Io(source) => io_error(context, source),
        other => CliError::data(format!("{context}: {other}")),
    }
}

/// Decode and dispatch failures mean the input is bad; registry setup
/// failures are ours.
pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::Wire(err) => wire_error(context, err),
        SchemaError::DuplicateRegistration { .. }
        | SchemaError::TypeAlreadyRegistered(_)
        | SchemaError::Unregistered(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::data(format!("{context}: {other}")),
    }
}
