use std::io::Read;

use bytes::BytesMut;
use serde::Serialize;
use storeproto_protocol::{build_registry, local_context};
use storeproto_wire::{decode_frame, family_name, DEFAULT_MAX_PAYLOAD};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, schema_error, wire_error, CliError, CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

#[derive(Serialize)]
struct DecodeOutput {
    key: String,
    family: &'static str,
    message: &'static str,
    request_id: u64,
    payload_len: usize,
    value: Option<String>,
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    let mut raw = Vec::new();
    if args.input.as_os_str() == "-" {
        std::io::stdin()
            .read_to_end(&mut raw)
            .map_err(|err| io_error("stdin", err))?;
    } else {
        raw = std::fs::read(&args.input)
            .map_err(|err| io_error(&args.input.display().to_string(), err))?;
    }
    if args.hex {
        parse_hex(&raw)
    } else {
        Ok(raw)
    }
}

fn parse_hex(text: &[u8]) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::data("hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|_| CliError::data("invalid hex input"))?;
            u8::from_str_radix(text, 16)
                .map_err(|_| CliError::data(format!("invalid hex digits: {text}")))
        })
        .collect()
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(&args)?;
    let mut buf = BytesMut::from(&input[..]);
    let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
        .map_err(|err| wire_error("frame", err))?
        .ok_or_else(|| CliError::data(format!("incomplete frame ({} bytes)", input.len())))?;
    if !buf.is_empty() {
        tracing::warn!(trailing = buf.len(), "ignoring bytes after the first frame");
    }

    let out = if frame.is_keepalive() {
        DecodeOutput {
            key: frame.key.to_string(),
            family: family_name(frame.key.family),
            message: "keepalive",
            request_id: frame.request_id,
            payload_len: frame.payload.len(),
            value: None,
        }
    } else {
        let registry = build_registry().map_err(|err| schema_error("registry", err))?;
        let msg = registry
            .decode_frame(&frame, &local_context())
            .map_err(|err| schema_error("decode", err))?;
        DecodeOutput {
            key: frame.key.to_string(),
            family: family_name(frame.key.family),
            message: msg.message_name(),
            request_id: frame.request_id,
            payload_len: frame.payload.len(),
            value: Some(format!("{msg:#?}")),
        }
    };

    match format {
        OutputFormat::Json => output::print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("key: {} ({}.{})", out.key, out.family, out.message);
            println!("request id: {}", out.request_id);
            println!("payload: {} bytes", out.payload_len);
            if let Some(value) = &out.value {
                println!("{value}");
            }
        }
    }
    Ok(SUCCESS)
}
