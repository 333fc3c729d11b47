use serde::Serialize;
use storeproto_protocol::{build_registry, local_context};
use storeproto_schema::Context;

use crate::cmd::families::resolve_family;
use crate::cmd::SchemaArgs;
use crate::exit::{schema_error, CliError, CliResult, SUCCESS};
use crate::output::{self, cell_or_dash, OutputFormat};

#[derive(Serialize)]
struct TagRow {
    tag: u32,
    name: &'static str,
    wire_type: String,
    max_size: Option<u64>,
    group: Option<&'static str>,
}

#[derive(Serialize)]
struct SchemaOutput {
    key: String,
    message: &'static str,
    negotiated: bool,
    tags: Vec<TagRow>,
}

pub fn run(args: SchemaArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = build_registry().map_err(|err| schema_error("registry", err))?;
    let family = resolve_family(&registry, &args.family)?;
    let reg = registry.find(family, &args.message).ok_or_else(|| {
        CliError::usage(format!("unknown message in {}: {}", args.family, args.message))
    })?;

    let ctx = if args.bare {
        Context::new()
    } else {
        local_context()
    };
    let tags = reg
        .inspect(&ctx)
        .map_err(|err| schema_error("inspect", err))?
        .into_iter()
        .map(|info| TagRow {
            tag: info.tag,
            name: info.name,
            wire_type: format!("{:?}", info.wire_type).to_lowercase(),
            max_size: info.max_size,
            group: info.group,
        })
        .collect();
    let out = SchemaOutput {
        key: reg.key.to_string(),
        message: reg.name,
        negotiated: !args.bare,
        tags,
    };

    match format {
        OutputFormat::Json => output::print_json(&out),
        OutputFormat::Table => {
            println!("{} ({})", out.message, out.key);
            let mut table = output::table(vec!["TAG", "NAME", "WIRE", "MAX", "GROUP"]);
            for row in &out.tags {
                table.add_row(vec![
                    row.tag.to_string(),
                    row.name.to_string(),
                    row.wire_type.clone(),
                    cell_or_dash(row.max_size),
                    cell_or_dash(row.group),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} ({})", out.message, out.key);
            for row in &out.tags {
                println!("  {:>3} {} [{}]", row.tag, row.name, row.wire_type);
            }
        }
    }
    Ok(SUCCESS)
}
