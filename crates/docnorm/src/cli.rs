//! Command-line interface definitions using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Documentation export normalizer
///
/// Checks the link graph of an exported documentation tree and converts it
/// into a tree with clean file names and consistently rewritten links.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Generic error occurred
///   2  - Invalid arguments or configuration
///   3  - Source directory not found
///   4  - Broken links found or files failed to convert
///   5  - Permission denied
///  10  - File system error
#[derive(Parser)]
#[command(name = "docnorm")]
#[command(about = "Validate and normalize exported documentation trees", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Suppress non-essential output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: ./docnorm.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the JSON schema of command output and exit
    #[arg(long)]
    pub schema: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report broken links, unreferenced files and files without links
    ///
    /// Read-only. Exits with code 4 when any link is broken.
    Check {
        /// Root of the exported tree (default: `source` from the config file)
        source: Option<PathBuf>,

        /// Additional directory names to skip while scanning (repeatable)
        #[arg(long, value_name = "NAME")]
        exclude: Vec<String>,

        /// Output JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a sanitized copy of the tree with every internal link rewritten
    ///
    /// The source tree is never modified. Exits with code 4 when some files
    /// or links need manual follow-up.
    Convert {
        /// Root of the exported tree (default: `source` from the config file)
        source: Option<PathBuf>,

        /// Directory to write the converted tree to (default: `target` from the config file)
        target: Option<PathBuf>,

        /// Additional directory names to skip while scanning (repeatable)
        #[arg(long, value_name = "NAME")]
        exclude: Vec<String>,

        /// Drop every non-ASCII character from file names
        #[arg(long)]
        ascii_only: bool,

        /// Print the planned mapping without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output JSON format
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Check { .. } => "check",
            Commands::Convert { .. } => "convert",
        }
    }

    pub fn json(&self) -> bool {
        match self {
            Commands::Check { json, .. } | Commands::Convert { json, .. } => *json,
        }
    }
}
