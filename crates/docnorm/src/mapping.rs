//! Old-path to new-path mapping for conversion.
//!
//! Every original directory gets exactly one sanitized name, so all files
//! below it land in the same new directory. Within one target directory the
//! names already clean are reserved before anything else is sanitized: a clean
//! tree maps onto itself and a clean name is never displaced by a dirty
//! sibling.

use crate::config::Config;
use crate::errors::{FileError, ItemError, RunError};
use crate::path::RelPath;
use crate::sanitize::{claim_unique, clean_segment, SanitizeError, SanitizeOptions, SegmentKind};
use crate::scan::Inventory;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// One old-path to new-path pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct MappingEntry {
    pub from: RelPath,
    pub to: RelPath,
}

/// Injective mapping from original to sanitized paths, ordered by original path
#[derive(Debug, Clone, Default)]
pub struct PathMapping {
    forward: BTreeMap<RelPath, RelPath>,
    reverse: HashMap<RelPath, RelPath>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, refusing a destination that is already taken.
    pub fn insert(&mut self, from: RelPath, to: RelPath) -> Result<(), RunError> {
        if let Some(first) = self.reverse.get(&to) {
            return Err(RunError::Collision {
                destination: to,
                first: first.clone(),
                second: from,
            });
        }
        if let Some(previous) = self.forward.insert(from.clone(), to.clone()) {
            self.reverse.remove(&previous);
        }
        self.reverse.insert(to, from);
        Ok(())
    }

    pub fn get(&self, from: &RelPath) -> Option<&RelPath> {
        self.forward.get(from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &RelPath)> {
        self.forward.iter()
    }

    pub fn entries(&self) -> Vec<MappingEntry> {
        self.iter()
            .map(|(from, to)| MappingEntry {
                from: from.clone(),
                to: to.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Mapping plus everything that could not be mapped
#[derive(Debug, Default)]
pub struct MappingOutcome {
    pub mapping: PathMapping,
    /// Files whose name (or a containing directory name) failed to sanitize
    pub errors: Vec<FileError>,
    /// Files outside the conversion allow-list
    pub skipped: Vec<FileError>,
}

#[derive(Debug, Default)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, RelPath>,
}

impl DirNode {
    fn insert(&mut self, path: &RelPath) {
        let components: Vec<&str> = path.components().collect();
        let Some((name, dirs)) = components.split_last() else {
            return;
        };
        let mut node = self;
        for dir in dirs {
            node = node.dirs.entry(dir.to_string()).or_default();
        }
        node.files.insert(name.to_string(), path.clone());
    }

    fn all_files(&self) -> Vec<&RelPath> {
        let mut files: Vec<&RelPath> = self.files.values().collect();
        for dir in self.dirs.values() {
            files.extend(dir.all_files());
        }
        files
    }
}

enum Child<'a> {
    Dir(&'a str, &'a DirNode),
    File(&'a str, &'a RelPath),
}

impl Child<'_> {
    fn name(&self) -> &str {
        match self {
            Child::Dir(name, _) | Child::File(name, _) => name,
        }
    }

    fn kind(&self) -> SegmentKind {
        match self {
            Child::Dir(..) => SegmentKind::Directory,
            Child::File(..) => SegmentKind::File,
        }
    }
}

/// Compute the mapping for every convertible file of the inventory.
///
/// Returns `Err` only on a destination collision, which would mean two files
/// overwrite each other.
pub fn build_mapping(inventory: &Inventory, config: &Config) -> Result<MappingOutcome, RunError> {
    let options = config.sanitize_options();
    let mut outcome = MappingOutcome::default();
    let mut root = DirNode::default();

    for record in inventory.iter() {
        if config.is_convertible(record.path.extension()) {
            root.insert(&record.path);
        } else {
            debug!(path = %record.path, "skipping unsupported extension");
            outcome.skipped.push(FileError::for_path(
                &record.path,
                ItemError::UnsupportedExtension {
                    extension: record.path.extension().map(str::to_string),
                },
            ));
        }
    }

    let mut assignments = Vec::new();
    assign_directory(&root, None, &options, &mut assignments, &mut outcome.errors);

    // Assignments come out depth-first; the mapping re-orders by original path.
    for (from, to) in assignments {
        outcome.mapping.insert(from, to)?;
    }

    info!(
        mapped = outcome.mapping.len(),
        errors = outcome.errors.len(),
        skipped = outcome.skipped.len(),
        "built path mapping"
    );
    Ok(outcome)
}

fn assign_directory(
    node: &DirNode,
    new_dir: Option<&RelPath>,
    options: &SanitizeOptions,
    assignments: &mut Vec<(RelPath, RelPath)>,
    errors: &mut Vec<FileError>,
) {
    let mut children: Vec<Child> = node
        .dirs
        .iter()
        .map(|(name, dir)| Child::Dir(name, dir))
        .chain(node.files.iter().map(|(name, path)| Child::File(name, path)))
        .collect();
    children.sort_by(|a, b| a.name().cmp(b.name()));

    let cleaned: Vec<Result<String, SanitizeError>> = children
        .iter()
        .map(|child| clean_segment(child.name(), child.kind(), options))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let reserved: Vec<bool> = children
        .iter()
        .zip(&cleaned)
        .map(|(child, clean)| {
            matches!(clean, Ok(clean) if clean == child.name())
                && seen.insert(child.name().to_string())
        })
        .collect();
    let names: Vec<Result<String, SanitizeError>> = children
        .iter()
        .zip(cleaned)
        .zip(reserved)
        .map(|((child, clean), reserved)| {
            clean.map(|clean| {
                if reserved {
                    clean
                } else {
                    claim_unique(clean, child.kind(), &mut seen)
                }
            })
        })
        .collect();

    for (child, name) in children.iter().zip(names) {
        match (child, name) {
            (Child::File(_, original), Ok(name)) => {
                let new_path = RelPath::child_of(new_dir, &name);
                if original.as_str() != new_path.as_str() {
                    debug!(from = %original, to = %new_path, "renamed");
                }
                assignments.push(((*original).clone(), new_path));
            }
            (Child::Dir(_, dir), Ok(name)) => {
                let new_path = RelPath::child_of(new_dir, &name);
                assign_directory(dir, Some(&new_path), options, assignments, errors);
            }
            (Child::File(_, original), Err(err)) => {
                warn!(path = %original, error = %err, "cannot sanitize file name");
                errors.push(FileError::for_path(original, err));
            }
            (Child::Dir(name, dir), Err(err)) => {
                warn!(directory = %name, error = %err, "cannot sanitize directory name");
                for file in dir.all_files() {
                    errors.push(FileError::for_path(file, err.clone()));
                }
            }
        }
    }
}
