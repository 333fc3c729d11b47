use serde::Serialize;
use storeproto_protocol::{ErrorCode, CATEGORY};

use crate::cmd::ErrorsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

#[derive(Serialize)]
struct ErrorRow {
    code: u32,
    name: &'static str,
    text: &'static str,
}

#[derive(Serialize)]
struct ErrorsOutput {
    category: &'static str,
    codes: Vec<ErrorRow>,
}

pub fn run(_args: ErrorsArgs, format: OutputFormat) -> CliResult<i32> {
    let codes = ErrorCode::ALL
        .iter()
        .map(|code| ErrorRow {
            code: code.code(),
            name: code.name(),
            text: code.text(),
        })
        .collect();
    let out = ErrorsOutput {
        category: CATEGORY,
        codes,
    };

    match format {
        OutputFormat::Json => output::print_json(&out),
        OutputFormat::Table => {
            let mut table = output::table(vec!["CODE", "NAME", "TEXT"]);
            for row in &out.codes {
                table.add_row(vec![
                    row.code.to_string(),
                    row.name.to_string(),
                    row.text.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &out.codes {
                println!("({}:{}) {} {}", out.category, row.code, row.name, row.text);
            }
        }
    }
    Ok(SUCCESS)
}
