//! Link-graph validation
//!
//! Classifies every extracted link against the inventory and derives the
//! check report: broken links per file, unreferenced files, files without
//! links and aggregate counts.

use super::links::{parse_target, BrokenReason, ExtractedLink, ParsedTarget};
use super::{Document, Extraction};
use crate::errors::FileError;
use crate::path::{resolve, RelPath, ResolveError};
use crate::scan::Inventory;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

const MAX_SUGGESTIONS: usize = 3;

/// How a link relates to the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    Valid { target: RelPath },
    Broken { reason: BrokenReason },
    External,
    Fragment,
}

/// One link of one source file, classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LinkReference {
    pub source: RelPath,
    pub link: ExtractedLink,
    pub classification: Classification,
}

impl LinkReference {
    /// The file this link points at, for valid links only
    pub fn resolved_target(&self) -> Option<&RelPath> {
        match &self.classification {
            Classification::Valid { target } => Some(target),
            _ => None,
        }
    }
}

/// Resolves link targets against one inventory
pub struct LinkValidator<'a> {
    inventory: &'a Inventory,
}

impl<'a> LinkValidator<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self { inventory }
    }

    /// Classify a raw target written in `source`.
    pub fn classify(&self, source: &RelPath, raw_target: &str) -> Classification {
        let path = match parse_target(raw_target) {
            Ok(ParsedTarget::External) => return Classification::External,
            Ok(ParsedTarget::Fragment) => return Classification::Fragment,
            Ok(ParsedTarget::Path { path, .. }) => path,
            Err(reason) => return Classification::Broken { reason },
        };

        match resolve(source, &path) {
            Ok(target) if self.inventory.contains(&target) => Classification::Valid { target },
            Ok(_) | Err(ResolveError::Empty) => Classification::Broken {
                reason: BrokenReason::NotFound,
            },
            Err(ResolveError::OutsideCorpus) => Classification::Broken {
                reason: BrokenReason::OutsideCorpus,
            },
        }
    }

    /// Classify every link of a document, in discovery order.
    pub fn classify_document(&self, document: &Document) -> Vec<LinkReference> {
        document
            .links
            .iter()
            .map(|link| LinkReference {
                source: document.path.clone(),
                classification: self.classify(&document.path, &link.raw_target),
                link: link.clone(),
            })
            .collect()
    }

    /// Inventory paths a broken target may have meant.
    ///
    /// Tried in order: the target with `.md` appended, files with the same
    /// name ignoring case, then paths containing the name ignoring case.
    pub fn suggest(&self, source: &RelPath, raw_target: &str) -> Vec<RelPath> {
        let Ok(ParsedTarget::Path { path, .. }) = parse_target(raw_target) else {
            return Vec::new();
        };
        let mut suggestions: Vec<RelPath> = Vec::new();
        let push = |candidate: &RelPath, suggestions: &mut Vec<RelPath>| {
            if suggestions.len() < MAX_SUGGESTIONS && !suggestions.contains(candidate) {
                suggestions.push(candidate.clone());
            }
        };

        if let Ok(resolved) = resolve(source, &format!("{}.md", path.trim_end_matches('/'))) {
            if self.inventory.contains(&resolved) {
                push(&resolved, &mut suggestions);
            }
        }

        let name = path
            .rsplit(['/', '\\'])
            .find(|part| !part.is_empty() && *part != "." && *part != "..")
            .map(str::to_lowercase);
        let Some(name) = name else {
            return suggestions;
        };

        for record in self.inventory.iter() {
            if record.path.file_name().to_lowercase() == name {
                push(&record.path, &mut suggestions);
            }
        }
        for record in self.inventory.iter() {
            if record.path.as_str().to_lowercase().contains(&name) {
                push(&record.path, &mut suggestions);
            }
        }
        suggestions
    }
}

/// A broken link as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BrokenLink {
    pub line: usize,
    pub target: String,
    pub reason: BrokenReason,
    pub suggestions: Vec<RelPath>,
}

/// Broken links of one source file, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BrokenFile {
    pub file: RelPath,
    pub links: Vec<BrokenLink>,
}

/// Aggregate counts of a check run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Stats {
    pub total_files: usize,
    pub markdown_files: usize,
    pub files_with_broken_links: usize,
    pub unreferenced: usize,
    pub no_links: usize,
    pub broken_links: usize,
    pub valid_links: usize,
    pub external_links: usize,
    pub fragment_links: usize,
}

/// Link integrity report for one corpus
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Report {
    /// Source files with at least one broken link, in inventory order
    pub broken: Vec<BrokenFile>,
    /// Files no valid link points at
    pub unreferenced: Vec<RelPath>,
    /// Readable markdown files without any link
    pub no_links: Vec<RelPath>,
    /// Files that could not be scanned or read
    pub errors: Vec<FileError>,
    pub stats: Stats,
}

impl Report {
    pub fn has_broken_links(&self) -> bool {
        !self.broken.is_empty()
    }
}

/// Validate every extracted document against the inventory.
pub fn validate(inventory: &Inventory, extraction: &Extraction) -> Report {
    let validator = LinkValidator::new(inventory);
    let mut referenced: HashSet<RelPath> = HashSet::new();
    let mut broken = Vec::new();
    let mut no_links = Vec::new();
    let mut stats = Stats {
        total_files: inventory.len(),
        markdown_files: inventory.markdown_files().count(),
        ..Stats::default()
    };

    for document in &extraction.documents {
        if document.links.is_empty() {
            no_links.push(document.path.clone());
            continue;
        }

        let mut broken_links = Vec::new();
        for reference in validator.classify_document(document) {
            match &reference.classification {
                Classification::Valid { target } => {
                    stats.valid_links += 1;
                    referenced.insert(target.clone());
                }
                Classification::Broken { reason } => {
                    stats.broken_links += 1;
                    let suggestions = match reason {
                        BrokenReason::NotFound => {
                            validator.suggest(&reference.source, &reference.link.raw_target)
                        }
                        _ => Vec::new(),
                    };
                    debug!(
                        source = %reference.source,
                        line = reference.link.line,
                        target = %reference.link.raw_target,
                        %reason,
                        "broken link"
                    );
                    broken_links.push(BrokenLink {
                        line: reference.link.line,
                        target: reference.link.raw_target.clone(),
                        reason: *reason,
                        suggestions,
                    });
                }
                Classification::External => stats.external_links += 1,
                Classification::Fragment => stats.fragment_links += 1,
            }
        }

        if !broken_links.is_empty() {
            broken.push(BrokenFile {
                file: document.path.clone(),
                links: broken_links,
            });
        }
    }

    let unreferenced: Vec<RelPath> = inventory
        .iter()
        .filter(|record| !referenced.contains(&record.path))
        .map(|record| record.path.clone())
        .collect();

    let mut errors = inventory.errors().to_vec();
    errors.extend(extraction.errors.iter().cloned());

    stats.files_with_broken_links = broken.len();
    stats.unreferenced = unreferenced.len();
    stats.no_links = no_links.len();

    info!(
        broken = stats.broken_links,
        valid = stats.valid_links,
        unreferenced = stats.unreferenced,
        "validated link graph"
    );
    Report {
        broken,
        unreferenced,
        no_links,
        errors,
        stats,
    }
}
