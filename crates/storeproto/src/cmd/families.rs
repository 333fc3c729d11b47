use serde::Serialize;
use storeproto_protocol::build_registry;
use storeproto_schema::TypeRegistry;
use storeproto_wire::FamilyId;

use crate::cmd::FamiliesArgs;
use crate::exit::{schema_error, CliError, CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

#[derive(Serialize)]
struct MessageRow {
    family: FamilyId,
    family_name: &'static str,
    message: u16,
    name: &'static str,
    format_version: u32,
}

/// Resolve a family given by name (case-insensitive) or numeric id.
pub(crate) fn resolve_family(registry: &TypeRegistry, family: &str) -> CliResult<FamilyId> {
    if let Ok(id) = family.parse::<FamilyId>() {
        if registry.families().any(|(known, _)| known == id) {
            return Ok(id);
        }
    }
    registry
        .families()
        .find(|(_, name)| name.eq_ignore_ascii_case(family))
        .map(|(id, _)| id)
        .ok_or_else(|| CliError::usage(format!("unknown family: {family}")))
}

pub fn run(args: FamiliesArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = build_registry().map_err(|err| schema_error("registry", err))?;
    let only = args
        .family
        .as_deref()
        .map(|family| resolve_family(&registry, family))
        .transpose()?;
    let names: Vec<(FamilyId, &'static str)> = registry.families().collect();

    let rows: Vec<MessageRow> = registry
        .registrations()
        .into_iter()
        .filter(|reg| only.is_none_or(|id| reg.key.family == id))
        .map(|reg| MessageRow {
            family: reg.key.family,
            family_name: names
                .iter()
                .find(|(id, _)| *id == reg.key.family)
                .map_or("unknown", |(_, name)| name),
            message: reg.key.message,
            name: reg.name,
            format_version: reg.format_version,
        })
        .collect();

    match format {
        OutputFormat::Json => output::print_json(&rows),
        OutputFormat::Table => {
            let mut table = output::table(vec!["KEY", "FAMILY", "MESSAGE", "FORMAT"]);
            for row in &rows {
                table.add_row(vec![
                    format!("{}:{}", row.family, row.message),
                    row.family_name.to_string(),
                    row.name.to_string(),
                    row.format_version.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{}:{} {}.{}",
                    row.family, row.message, row.family_name, row.name
                );
            }
        }
    }
    Ok(SUCCESS)
}
