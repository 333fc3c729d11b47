use serde::Serialize;
use storeproto_protocol::families::{auth, core, main};
use storeproto_schema::VersionRecord;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct FamilyVersion {
    family: &'static str,
    version: u32,
    counters: Vec<(&'static str, u32)>,
}

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    features: Vec<&'static str>,
    families: Vec<FamilyVersion>,
}

fn family<V: VersionRecord>() -> FamilyVersion {
    let local = V::local();
    FamilyVersion {
        family: V::FAMILY,
        version: local.version(),
        counters: local.counters(),
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("storeproto {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let mut features = vec!["cli"];
    if cfg!(feature = "peer") {
        features.push("peer");
    }
    let output = VersionOutput {
        name: "storeproto",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("STOREPROTO_BUILD_TARGET").unwrap_or("unknown"),
        features,
        families: vec![
            family::<core::Version>(),
            family::<auth::Version>(),
            family::<main::Version>(),
        ],
    };

    match format {
        OutputFormat::Json => crate::output::print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("name: {}", output.name);
            println!("version: {}", output.version);
            println!("target: {}", output.target);
            println!("features: {}", output.features.join(", "));
            for family in &output.families {
                let counters: Vec<String> = family
                    .counters
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                println!(
                    "{}: version={} {}",
                    family.family,
                    family.version,
                    counters.join(" ")
                );
            }
        }
    }

    Ok(SUCCESS)
}
