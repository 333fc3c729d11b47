use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod errors;
pub mod families;
pub mod schema;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// List every registered (family, message) pair.
    Families(FamiliesArgs),
    /// List the result-code taxonomy.
    Errors(ErrorsArgs),
    /// Show the field tags of one message type.
    Schema(SchemaArgs),
    /// Decode one frame and print the message it carries.
    Decode(DecodeArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args, format),
        Command::Families(args) => families::run(args, format),
        Command::Errors(args) => errors::run(args, format),
        Command::Schema(args) => schema::run(args, format),
        Command::Decode(args) => decode::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build details and local protocol versions.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct FamiliesArgs {
    /// Only list this family (name or id).
    #[arg(long)]
    pub family: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ErrorsArgs {}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Family name (core, auth, main) or numeric id.
    pub family: String,
    /// Message type name, case-insensitive.
    pub message: String,
    /// Inspect without negotiated versions, as before the handshake.
    #[arg(long)]
    pub bare: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding one encoded frame, or `-` for stdin.
    pub input: PathBuf,
    /// Input is hex text (whitespace ignored).
    #[arg(long)]
    pub hex: bool,
}
