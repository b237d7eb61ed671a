use crate::config::Config;
use crate::document::{extract_documents, AdapterRegistry};
use crate::errors::{FileError, RunError};
use crate::mapping::{build_mapping, MappingEntry};
use crate::rewrite::{apply, rewrite, RewriteStats};
use crate::scan::scan;
use anyhow::Result;
use schemars::JsonSchema;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tracing::{info, info_span};

/// Processing summary of one conversion run
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConversionSummary {
    pub source: String,
    pub target: String,
    /// Nothing was written
    pub dry_run: bool,
    /// Files written or copied into the target tree
    pub files_processed: usize,
    /// Files with a destination in the mapping
    pub files_mapped: usize,
    pub bytes_written: u64,
    pub mappings: Vec<MappingEntry>,
    /// Per-file problems, in pipeline order
    pub errors: Vec<FileError>,
    /// Files left out because of their extension
    pub skipped: Vec<FileError>,
    pub links: RewriteStats,
    /// Cancelled before every file was processed
    pub interrupted: bool,
}

impl ConversionSummary {
    /// Whether the run needs manual follow-up
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Convert the corpus at `source` into a sanitized tree at `target`.
///
/// With `dry_run`, the mapping and predicted link errors are computed and
/// nothing is written. `cancel` is polled between files.
pub fn convert(
    source: &Path,
    target: &Path,
    config: &Config,
    dry_run: bool,
    cancel: &AtomicBool,
) -> Result<ConversionSummary> {
    let _span = info_span!("convert", source = %source.display(), target = %target.display()).entered();

    let source = std::fs::canonicalize(source).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => RunError::SourceMissing(source.to_path_buf()),
        _ => RunError::SourceUnreadable {
            path: source.to_path_buf(),
            source: err,
        },
    })?;
    let target = absolute_target(target).map_err(|err| RunError::TargetUnwritable {
        path: target.to_path_buf(),
        source: err,
    })?;
    if target == source {
        return Err(RunError::TargetIsSource(target).into());
    }
    let nested = target.starts_with(&source).then_some(target.as_path());

    let inventory = scan(&source, config, nested)?;
    let extraction = extract_documents(&inventory, &AdapterRegistry::with_builtins());
    let outcome = build_mapping(&inventory, config)?;
    let write_set = rewrite(&inventory, &outcome.mapping, &extraction);

    let mut errors: Vec<FileError> = inventory.errors().to_vec();
    errors.extend(outcome.errors.iter().cloned());
    errors.extend(extraction.errors.iter().cloned());
    errors.extend(write_set.errors.iter().cloned());

    let mut summary = ConversionSummary {
        source: source.display().to_string(),
        target: target.display().to_string(),
        dry_run,
        files_processed: 0,
        files_mapped: outcome.mapping.len(),
        bytes_written: 0,
        mappings: outcome.mapping.entries(),
        errors,
        skipped: outcome.skipped,
        links: write_set.stats.clone(),
        interrupted: false,
    };

    if dry_run {
        info!(mapped = summary.files_mapped, "dry run, nothing written");
        return Ok(summary);
    }

    let applied = apply(&write_set, &source, &target, cancel)?;
    summary.files_processed = applied.completed;
    summary.bytes_written = applied.bytes_written;
    summary.interrupted = applied.interrupted;
    summary.errors.extend(applied.errors);

    info!(
        processed = summary.files_processed,
        errors = summary.errors.len(),
        interrupted = summary.interrupted,
        "conversion finished"
    );
    Ok(summary)
}

/// Absolute, symlink-resolved form of a target that may not exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing tail is
/// appended, so the result compares equal to canonical source paths.
fn absolute_target(target: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(target)?;
    let mut existing = absolute.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        match std::fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut result = canonical;
                for part in tail.iter().rev() {
                    result.push(part);
                }
                return Ok(result);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        tail.push(name);
                        existing = parent;
                    }
                    _ => return Ok(absolute.clone()),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_convert_renames_and_rewrites() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("export");
        write(&source, "index.md", "[p](./sub%20dir/My%20Page.md)");
        write(&source, "sub dir/My Page.md", "# Page");

        let target = temp.path().join("out");
        let summary =
            convert(&source, &target, &Config::default(), false, &AtomicBool::new(false)).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.links.rewritten, 1);
        assert!(!summary.has_errors());
        assert_eq!(
            fs::read_to_string(target.join("index.md")).unwrap(),
            "[p](sub-dir/My%20Page.md)"
        );
        assert!(target.join("sub-dir/My Page.md").is_file());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("export");
        write(&source, "a 0123456789abcdef.md", "x");

        let target = temp.path().join("out");
        let summary =
            convert(&source, &target, &Config::default(), true, &AtomicBool::new(false)).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.files_mapped, 1);
        assert_eq!(summary.mappings[0].to.as_str(), "a.md");
        assert!(!target.exists());
    }

    #[test]
    fn test_target_equal_to_source_rejected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.md", "x");

        let err = convert(
            temp.path(),
            &temp.path().join("."),
            &Config::default(),
            false,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::TargetIsSource(_))
        ));
    }

    #[test]
    fn test_nested_target_is_excluded_from_scan() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.md", "x");

        let target = temp.path().join("converted");
        convert(temp.path(), &target, &Config::default(), false, &AtomicBool::new(false)).unwrap();
        let again =
            convert(temp.path(), &target, &Config::default(), false, &AtomicBool::new(false)).unwrap();

        assert_eq!(again.files_mapped, 1);
        assert!(!target.join("converted").exists());
    }

    #[test]
    fn test_unsupported_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("export");
        write(&source, "a.md", "x");
        write(&source, "notes.txt", "x");

        let summary = convert(
            &source,
            &temp.path().join("out"),
            &Config::default(),
            false,
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, "notes.txt");
        assert!(!temp.path().join("out/notes.txt").exists());
    }
}
