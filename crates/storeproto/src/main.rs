mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "storeproto",
    version,
    about = "Inspect the app-store wire protocol"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "STOREPROTO_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schema_subcommand() {
        let cli = Cli::try_parse_from(["storeproto", "schema", "main", "FetchBuildResponse", "--bare"])
            .expect("schema args should parse");
        match cli.command {
            Command::Schema(args) => {
                assert_eq!(args.family, "main");
                assert_eq!(args.message, "FetchBuildResponse");
                assert!(args.bare);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_decode_from_stdin() {
        let cli = Cli::try_parse_from(["storeproto", "--format", "json", "decode", "-", "--hex"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.input.as_os_str(), "-");
                assert!(args.hex);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn schema_requires_a_message() {
        let err = Cli::try_parse_from(["storeproto", "schema", "main"])
            .expect_err("missing message should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["storeproto", "--log-level", "loud", "errors"])
            .expect_err("bad level should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
