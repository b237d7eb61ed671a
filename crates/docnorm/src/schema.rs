//! Command and output schema export (`docnorm --schema`).
//!
//! Commands and their flags come from the clap definition; output types come
//! from their `JsonSchema` derives, so the schema cannot drift from the code.

use crate::commands::ConversionSummary;
use crate::document::Report;
use crate::output::ExitCode;
use clap::CommandFactory;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Complete schema for the docnorm CLI
#[derive(Debug, Serialize)]
pub struct CommandSchema {
    pub version: String,
    pub commands: BTreeMap<String, CommandDoc>,
    pub exit_codes: Vec<ExitCodeDoc>,
}

/// One subcommand
#[derive(Debug, Serialize)]
pub struct CommandDoc {
    pub description: String,
    /// Positional arguments, in order
    pub args: Vec<String>,
    /// Long flags, without the leading dashes
    pub flags: Vec<String>,
    /// JSON schema of the `data` field in `--json` output
    pub output: Value,
}

#[derive(Debug, Serialize)]
pub struct ExitCodeDoc {
    pub code: i32,
    pub description: String,
}

impl CommandSchema {
    pub fn generate() -> Self {
        let cli = crate::cli::Cli::command();
        let mut commands = BTreeMap::new();

        for subcmd in cli.get_subcommands() {
            let name = subcmd.get_name();
            let output = match name {
                "check" => serde_json::to_value(schemars::schema_for!(Report)),
                "convert" => serde_json::to_value(schemars::schema_for!(ConversionSummary)),
                _ => continue,
            }
            .unwrap_or(Value::Null);

            let args = subcmd
                .get_positionals()
                .map(|arg| arg.get_id().to_string())
                .collect();
            let flags = subcmd
                .get_arguments()
                .filter_map(|arg| arg.get_long().map(str::to_string))
                .collect();
            commands.insert(
                name.to_string(),
                CommandDoc {
                    description: subcmd.get_about().map(|s| s.to_string()).unwrap_or_default(),
                    args,
                    flags,
                    output,
                },
            );
        }

        let exit_codes = ExitCode::ALL
            .into_iter()
            .map(|code| ExitCodeDoc {
                code: code.code(),
                description: code.description().to_string(),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commands,
            exit_codes,
        }
    }
}
