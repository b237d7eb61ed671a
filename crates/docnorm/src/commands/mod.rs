//! Pipeline entry points behind the CLI subcommands.
//!
//! - `check`: scan, extract and validate (read-only)
//! - `convert`: scan, extract, map, rewrite and apply

mod check;
mod convert;

pub use check::check;
pub use convert::{convert, ConversionSummary};
