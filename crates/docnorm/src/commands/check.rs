use crate::config::Config;
use crate::document::{extract_documents, validate, AdapterRegistry, Report};
use crate::scan::scan;
use anyhow::Result;
use std::path::Path;
use tracing::info_span;

/// Validate the link graph of the corpus at `source`.
pub fn check(source: &Path, config: &Config) -> Result<Report> {
    let _span = info_span!("check", source = %source.display()).entered();

    let inventory = scan(source, config, None)?;
    let extraction = extract_documents(&inventory, &AdapterRegistry::with_builtins());
    Ok(validate(&inventory, &extraction))
}
