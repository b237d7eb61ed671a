//! Corpus scanning: the inventory of every file under the source root.

use crate::config::Config;
use crate::errors::{FileError, ItemError, RunError};
use crate::path::RelPath;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Coarse file classification by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Markdown,
    Media,
    Other,
}

impl FileKind {
    pub fn classify(path: &RelPath, media_extensions: &[String]) -> Self {
        match path.extension().map(|e| e.to_ascii_lowercase()) {
            Some(ext) if ext == "md" || ext == "markdown" => FileKind::Markdown,
            Some(ext) if media_extensions.contains(&ext) => FileKind::Media,
            _ => FileKind::Other,
        }
    }
}

/// A regular file found while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FileRecord {
    pub path: RelPath,
    pub kind: FileKind,
    pub size: Option<u64>,
}

/// Every file of one corpus, ordered lexicographically by path
#[derive(Debug, Clone)]
pub struct Inventory {
    root: PathBuf,
    files: BTreeMap<RelPath, FileRecord>,
    errors: Vec<FileError>,
}

impl Inventory {
    /// Build an inventory from already-known records (no filesystem access).
    pub fn from_records(root: impl Into<PathBuf>, records: impl IntoIterator<Item = FileRecord>) -> Self {
        Self {
            root: root.into(),
            files: records.into_iter().map(|r| (r.path.clone(), r)).collect(),
            errors: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, path: &RelPath) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.get(path).is_some()
    }

    /// Records in scan order
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn markdown_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.iter().filter(|r| r.kind == FileKind::Markdown)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entries that could not be recorded
    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }
}

/// Walk `root` and record every regular file.
///
/// Directories named in the configured exclusion list are pruned, as is
/// `exclude_path` (used when the target tree lives inside the source tree).
/// Symlinks are not followed. A missing or unreadable root is fatal; trouble
/// with anything below it is recorded per entry.
pub fn scan(root: &Path, config: &Config, exclude_path: Option<&Path>) -> Result<Inventory, RunError> {
    let metadata = std::fs::metadata(root).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => RunError::SourceMissing(root.to_path_buf()),
        _ => RunError::SourceUnreadable {
            path: root.to_path_buf(),
            source: err,
        },
    })?;
    if !metadata.is_dir() {
        return Err(RunError::SourceNotDirectory(root.to_path_buf()));
    }

    let exclude_dirs = config.exclude_dirs();
    let media_extensions = config.media_extensions();
    let mut inventory = Inventory {
        root: root.to_path_buf(),
        files: BTreeMap::new(),
        errors: Vec::new(),
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, &exclude_dirs, exclude_path));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop at corpus root"));
                    return Err(RunError::SourceUnreadable {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                let path = err
                    .path()
                    .map(|p| display_relative(root, p))
                    .unwrap_or_default();
                warn!(path = %path, error = %err, "skipping unreadable entry");
                inventory.errors.push(FileError::new(
                    path,
                    ItemError::Io {
                        message: err.to_string(),
                    },
                ));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            if entry.file_type().is_symlink() {
                debug!(path = %entry.path().display(), "skipping symlink");
            }
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let Some(path) = RelPath::from_fs_path(relative) else {
            warn!(path = %relative.display(), "skipping path that is not valid UTF-8");
            inventory
                .errors
                .push(FileError::new(relative.to_string_lossy(), ItemError::NonUtf8Path));
            continue;
        };

        let kind = FileKind::classify(&path, &media_extensions);
        let size = entry.metadata().ok().map(|m| m.len());
        debug!(path = %path, ?kind, "recorded file");
        inventory
            .files
            .insert(path.clone(), FileRecord { path, kind, size });
    }

    info!(
        root = %root.display(),
        files = inventory.files.len(),
        errors = inventory.errors.len(),
        "scanned corpus"
    );
    Ok(inventory)
}

fn is_excluded(entry: &DirEntry, exclude_dirs: &[String], exclude_path: Option<&Path>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    if exclude_path.is_some_and(|p| entry.path() == p) {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| exclude_dirs.iter().any(|d| d == name))
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
