//! Documentation export normalizer
//!
//! Validates the link graph of an exported documentation tree and converts
//! it into a tree with sanitized paths and consistently rewritten links.
//!
//! Two pipelines share one inventory and one path-resolution function:
//!
//! - check: [`scan::scan`] → [`document::extract_documents`] → [`document::validate`]
//! - convert: [`scan::scan`] → [`document::extract_documents`] →
//!   [`mapping::build_mapping`] → [`rewrite::rewrite`] → [`rewrite::apply`]

pub mod cli;
pub mod commands;
pub mod config;
pub mod document;
pub mod errors;
pub mod mapping;
pub mod output;
pub mod path;
pub mod report;
pub mod rewrite;
pub mod sanitize;
pub mod scan;
pub mod schema;

// Re-export commonly used types
pub use commands::{check, convert, ConversionSummary};
pub use config::Config;
pub use document::Report;
pub use errors::{FileError, ItemError, RunError};
pub use output::{ExitCode, JsonError, JsonOutput};
pub use path::RelPath;
pub use scan::{scan, Inventory};
