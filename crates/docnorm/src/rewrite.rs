//! Link rewriting and relocation of files into the target tree.
//!
//! [`rewrite`] is pure: it decides, for every mapped file, whether it is
//! copied as-is or written with rewritten link targets. [`apply`] performs
//! the resulting operations against the filesystem.

use crate::document::{
    has_unescaped_parens, parse_target, Classification, Document, Extraction, LinkValidator,
    ParsedTarget, Span,
};
use crate::errors::{FileError, ItemError, RunError};
use crate::mapping::PathMapping;
use crate::path::{resolve, RelPath};
use crate::scan::Inventory;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Bytes that are escaped in a rewritten link destination. Non-ASCII is
/// always escaped.
const LINK_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'(')
    .add(b')')
    .add(b'%')
    .add(b'#')
    .add(b'?')
    .add(b'`')
    .add(b'[')
    .add(b']')
    .add(b'\\');

/// One filesystem operation of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Byte-for-byte copy
    Copy { from: RelPath, to: RelPath },
    /// Write new content for a document
    Write {
        from: RelPath,
        to: RelPath,
        content: String,
    },
}

impl WriteOp {
    pub fn source(&self) -> &RelPath {
        match self {
            WriteOp::Copy { from, .. } | WriteOp::Write { from, .. } => from,
        }
    }

    pub fn destination(&self) -> &RelPath {
        match self {
            WriteOp::Copy { to, .. } | WriteOp::Write { to, .. } => to,
        }
    }
}

/// Link counts of a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RewriteStats {
    /// Links whose target text changed
    pub rewritten: usize,
    /// Valid links that already pointed at the right place
    pub unchanged: usize,
    /// Broken links, left as written and recorded as errors
    pub broken: usize,
    /// Links with unescaped parentheses, left as written
    pub unsafe_links: usize,
    /// Valid links whose target is not part of the converted tree
    pub unconverted: usize,
}

/// Planned operations, in mapping order
#[derive(Debug, Default)]
pub struct WriteSet {
    pub ops: Vec<WriteOp>,
    pub errors: Vec<FileError>,
    pub stats: RewriteStats,
}

/// Outcome of [`apply`]
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ApplySummary {
    /// Operations completed successfully
    pub completed: usize,
    pub bytes_written: u64,
    pub errors: Vec<FileError>,
    /// Cancellation was observed before every operation ran
    pub interrupted: bool,
}

struct Edit {
    span: Span,
    replacement: String,
}

/// Plan the conversion of every mapped file.
///
/// Markdown documents that were read successfully get their valid links
/// rewritten for the new layout; everything else (including markdown that
/// could not be read) is copied.
pub fn rewrite(inventory: &Inventory, mapping: &PathMapping, extraction: &Extraction) -> WriteSet {
    let validator = LinkValidator::new(inventory);
    let documents: HashMap<&RelPath, &Document> =
        extraction.documents.iter().map(|doc| (&doc.path, doc)).collect();
    let mut write_set = WriteSet::default();

    for (from, to) in mapping.iter() {
        let op = match documents.get(from) {
            Some(document) => WriteOp::Write {
                from: from.clone(),
                to: to.clone(),
                content: rewrite_document(document, to, &validator, mapping, &mut write_set),
            },
            None => WriteOp::Copy {
                from: from.clone(),
                to: to.clone(),
            },
        };
        write_set.ops.push(op);
    }

    info!(
        ops = write_set.ops.len(),
        rewritten = write_set.stats.rewritten,
        broken = write_set.stats.broken,
        unsafe_links = write_set.stats.unsafe_links,
        "planned rewrite"
    );
    write_set
}

fn rewrite_document(
    document: &Document,
    new_path: &RelPath,
    validator: &LinkValidator<'_>,
    mapping: &PathMapping,
    write_set: &mut WriteSet,
) -> String {
    let mut edits = Vec::new();

    for reference in validator.classify_document(document) {
        let link = &reference.link;
        let target = match &reference.classification {
            Classification::External | Classification::Fragment => continue,
            classification if has_unescaped_parens(&link.raw_target) => {
                warn!(path = %document.path, line = link.line, target = %link.raw_target, "unsafe link target left unchanged");
                write_set.stats.unsafe_links += 1;
                if matches!(classification, Classification::Broken { .. }) {
                    write_set.stats.broken += 1;
                }
                write_set.errors.push(FileError::for_path(
                    &document.path,
                    ItemError::UnsafeTarget {
                        line: link.line,
                        target: link.raw_target.clone(),
                    },
                ));
                continue;
            }
            Classification::Broken { reason } => {
                debug!(path = %document.path, line = link.line, target = %link.raw_target, "broken link left unchanged");
                write_set.stats.broken += 1;
                write_set.errors.push(FileError::for_path(
                    &document.path,
                    ItemError::BrokenLink {
                        line: link.line,
                        target: link.raw_target.clone(),
                        reason: *reason,
                    },
                ));
                continue;
            }
            Classification::Valid { target } => target,
        };

        let Some(new_target) = mapping.get(target) else {
            write_set.stats.unconverted += 1;
            write_set.errors.push(FileError::for_path(
                &document.path,
                ItemError::TargetNotConverted {
                    line: link.line,
                    target: link.raw_target.clone(),
                },
            ));
            continue;
        };

        let Ok(ParsedTarget::Path { path, suffix }) = parse_target(&link.raw_target) else {
            continue;
        };
        if resolve(new_path, &path).as_ref() == Ok(new_target) {
            write_set.stats.unchanged += 1;
            continue;
        }

        let relocated = if path.starts_with('/') {
            format!("/{}", encode(new_target.as_str()))
        } else {
            encode(&new_target.relative_from(new_path.parent().as_ref()))
        };
        let replacement = format!("{}{}", relocated, suffix);
        debug!(path = %document.path, line = link.line, from = %link.raw_target, to = %replacement, "rewrote link");
        write_set.stats.rewritten += 1;
        edits.push(Edit {
            span: link.span,
            replacement,
        });
    }

    apply_edits(&document.content, edits)
}

fn encode(path: &str) -> String {
    utf8_percent_encode(path, LINK_UNSAFE).to_string()
}

/// Splice replacements into `content`, back to front so earlier spans stay valid.
fn apply_edits(content: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| edit.span.start);
    let mut result = content.to_string();
    for edit in edits.into_iter().rev() {
        result.replace_range(edit.span.start..edit.span.end, &edit.replacement);
    }
    result
}

/// Execute a write set.
///
/// Operations run in order; `cancel` is checked before each one. Parent
/// directories are created as needed. Per-file I/O failures are collected;
/// an unwritable target root or a destination written twice aborts.
pub fn apply(
    write_set: &WriteSet,
    source_root: &Path,
    target_root: &Path,
    cancel: &AtomicBool,
) -> Result<ApplySummary, RunError> {
    apply_with_progress(write_set, source_root, target_root, cancel, |_| {})
}

/// [`apply`], calling `on_complete` after each successful operation.
pub(crate) fn apply_with_progress(
    write_set: &WriteSet,
    source_root: &Path,
    target_root: &Path,
    cancel: &AtomicBool,
    mut on_complete: impl FnMut(&WriteOp),
) -> Result<ApplySummary, RunError> {
    if cancel.load(Ordering::SeqCst) {
        warn!("conversion interrupted before writing");
        return Ok(ApplySummary {
            interrupted: true,
            ..ApplySummary::default()
        });
    }
    std::fs::create_dir_all(target_root).map_err(|source| RunError::TargetUnwritable {
        path: target_root.to_path_buf(),
        source,
    })?;

    let mut summary = ApplySummary::default();
    let mut written: HashMap<&RelPath, &RelPath> = HashMap::new();

    for op in &write_set.ops {
        if cancel.load(Ordering::SeqCst) {
            warn!(completed = summary.completed, "conversion interrupted");
            summary.interrupted = true;
            break;
        }

        let destination = op.destination();
        if let Some(first) = written.insert(destination, op.source()) {
            return Err(RunError::Collision {
                destination: destination.clone(),
                first: first.clone(),
                second: op.source().clone(),
            });
        }

        match execute(op, source_root, target_root) {
            Ok(bytes) => {
                summary.completed += 1;
                summary.bytes_written += bytes;
                on_complete(op);
            }
            Err(err) => {
                warn!(path = %op.source(), error = %err, "failed to write file");
                summary.errors.push(FileError::for_path(op.source(), err));
            }
        }
    }

    info!(
        completed = summary.completed,
        bytes = summary.bytes_written,
        errors = summary.errors.len(),
        "applied write set"
    );
    Ok(summary)
}

fn execute(op: &WriteOp, source_root: &Path, target_root: &Path) -> std::io::Result<u64> {
    let destination = op.destination().to_fs_path(target_root);
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match op {
        WriteOp::Copy { from, .. } => std::fs::copy(from.to_fs_path(source_root), &destination),
        WriteOp::Write { content, .. } => {
            std::fs::write(&destination, content)?;
            Ok(content.len() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BrokenReason, DocFormatAdapter, MarkdownAdapter};
    use crate::scan::{FileKind, FileRecord};
    use std::fs;
    use tempfile::TempDir;

    fn rel(path: &str) -> RelPath {
        RelPath::new(path).unwrap()
    }

    fn inventory(paths: &[&str]) -> Inventory {
        Inventory::from_records(
            "/corpus",
            paths.iter().map(|p| FileRecord {
                path: rel(p),
                kind: FileKind::classify(&rel(p), &["png".to_string()]),
                size: None,
            }),
        )
    }

    fn extraction(docs: &[(&str, &str)]) -> Extraction {
        Extraction {
            documents: docs
                .iter()
                .map(|(path, content)| Document {
                    path: rel(path),
                    content: content.to_string(),
                    links: MarkdownAdapter.extract_links(content),
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> PathMapping {
        let mut mapping = PathMapping::new();
        for (from, to) in pairs {
            mapping.insert(rel(from), rel(to)).unwrap();
        }
        mapping
    }

    fn written_content<'a>(set: &'a WriteSet, to: &str) -> &'a str {
        set.ops
            .iter()
            .find_map(|op| match op {
                WriteOp::Write { to: dest, content, .. } if dest.as_str() == to => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_rewrites_encoded_link_to_new_relative_path() {
        let inv = inventory(&["index.md", "sub dir/My Page.md"]);
        let ext = extraction(&[
            ("index.md", "See [page](./sub%20dir/My%20Page.md#intro).\n"),
            ("sub dir/My Page.md", "Back to [index](../index.md)\n"),
        ]);
        let map = mapping(&[
            ("index.md", "index.md"),
            ("sub dir/My Page.md", "sub-dir/My Page.md"),
        ]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(
            written_content(&set, "index.md"),
            "See [page](sub-dir/My%20Page.md#intro).\n"
        );
        assert_eq!(
            written_content(&set, "sub-dir/My Page.md"),
            "Back to [index](../index.md)\n"
        );
        assert_eq!(set.stats.rewritten, 1);
        assert_eq!(set.stats.unchanged, 1);
        assert!(set.errors.is_empty());
    }

    #[test]
    fn test_root_relative_links_stay_root_relative() {
        let inv = inventory(&["docs/a.md", "Media Files/x y.png"]);
        let ext = extraction(&[("docs/a.md", "![x](/Media%20Files/x%20y.png)")]);
        let map = mapping(&[
            ("docs/a.md", "docs/a.md"),
            ("Media Files/x y.png", "Media-Files/x y.png"),
        ]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(
            written_content(&set, "docs/a.md"),
            "![x](/Media-Files/x%20y.png)"
        );
    }

    #[test]
    fn test_external_fragment_and_broken_untouched() {
        let content = "[w](https://x.io/a b) [t](#top) [m](missing.md) [ok](b.md)";
        let inv = inventory(&["a.md", "b.md"]);
        let ext = extraction(&[("a.md", content)]);
        let map = mapping(&[("a.md", "a.md"), ("b.md", "b.md")]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(written_content(&set, "a.md"), content);
        assert_eq!(set.stats.broken, 1);
        assert_eq!(set.stats.unchanged, 1);
        assert_eq!(
            set.errors,
            vec![FileError::new(
                "a.md",
                ItemError::BrokenLink {
                    line: 1,
                    target: "missing.md".to_string(),
                    reason: BrokenReason::NotFound,
                }
            )]
        );
    }

    #[test]
    fn test_unescaped_parens_recorded_not_rewritten() {
        let content = "[p](Page (1).md) and [q](<Page (1).md>)";
        let inv = inventory(&["a.md", "Page (1).md"]);
        let ext = extraction(&[("a.md", content)]);
        let map = mapping(&[("a.md", "a.md"), ("Page (1).md", "Page-1.md")]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(
            written_content(&set, "a.md"),
            "[p](Page (1).md) and [q](Page-1.md)"
        );
        assert_eq!(set.stats.unsafe_links, 1);
        assert_eq!(set.stats.broken, 1);
        assert_eq!(
            set.errors,
            vec![FileError::new(
                "a.md",
                ItemError::UnsafeTarget {
                    line: 1,
                    target: "Page (1".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_broken_link_with_parens_counts_as_broken_and_unsafe() {
        let content = "[x](Missing (1).md)";
        let inv = inventory(&["a.md"]);
        let ext = extraction(&[("a.md", content)]);
        let map = mapping(&[("a.md", "a.md")]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(written_content(&set, "a.md"), content);
        assert_eq!(set.stats.broken, 1);
        assert_eq!(set.stats.unsafe_links, 1);
        assert_eq!(set.errors.len(), 1);
        assert!(matches!(set.errors[0].error, ItemError::UnsafeTarget { .. }));
    }

    #[test]
    fn test_target_outside_mapping_recorded() {
        let inv = inventory(&["a.md", "report.pdf"]);
        let ext = extraction(&[("a.md", "[r](report.pdf)")]);
        let map = mapping(&[("a.md", "a.md")]);

        let set = rewrite(&inv, &map, &ext);

        assert_eq!(set.stats.unconverted, 1);
        assert!(matches!(
            set.errors[0].error,
            ItemError::TargetNotConverted { line: 1, .. }
        ));
    }

    #[test]
    fn test_non_documents_are_copied() {
        let inv = inventory(&["a.md", "img/x.png"]);
        let map = mapping(&[("a.md", "a.md"), ("img/x.png", "img/x.png")]);

        let set = rewrite(&inv, &map, &Extraction::default());

        assert!(set
            .ops
            .iter()
            .all(|op| matches!(op, WriteOp::Copy { .. })));
    }

    #[test]
    fn test_apply_writes_and_copies() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("img dir")).unwrap();
        fs::write(source.path().join("img dir/x.png"), [1u8, 2, 3]).unwrap();

        let set = WriteSet {
            ops: vec![
                WriteOp::Write {
                    from: rel("a.md"),
                    to: rel("a.md"),
                    content: "hello".to_string(),
                },
                WriteOp::Copy {
                    from: rel("img dir/x.png"),
                    to: rel("img-dir/x.png"),
                },
            ],
            ..WriteSet::default()
        };

        let out = target.path().join("out");
        let summary = apply(&set, source.path(), &out, &AtomicBool::new(false)).unwrap();

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.bytes_written, 8);
        assert!(!summary.interrupted);
        assert_eq!(fs::read_to_string(out.join("a.md")).unwrap(), "hello");
        assert_eq!(fs::read(out.join("img-dir/x.png")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_records_missing_source_file() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let set = WriteSet {
            ops: vec![WriteOp::Copy {
                from: rel("gone.png"),
                to: rel("gone.png"),
            }],
            ..WriteSet::default()
        };

        let summary = apply(&set, source.path(), target.path(), &AtomicBool::new(false)).unwrap();

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].path, "gone.png");
    }

    #[test]
    fn test_apply_stops_when_cancelled() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let set = WriteSet {
            ops: vec![WriteOp::Write {
                from: rel("a.md"),
                to: rel("a.md"),
                content: "x".to_string(),
            }],
            ..WriteSet::default()
        };

        let out = target.path().join("out");
        let summary = apply(&set, source.path(), &out, &AtomicBool::new(true)).unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.completed, 0);
        assert!(!out.exists());
    }

    #[test]
    fn test_apply_interrupted_midway_keeps_completed_files() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let op = |name: &str| WriteOp::Write {
            from: rel(name),
            to: rel(name),
            content: name.to_string(),
        };
        let set = WriteSet {
            ops: vec![op("a.md"), op("b.md"), op("c.md")],
            ..WriteSet::default()
        };
        let cancel = AtomicBool::new(false);

        let out = target.path().join("out");
        let summary = apply_with_progress(&set, source.path(), &out, &cancel, |_| {
            cancel.store(true, Ordering::SeqCst)
        })
        .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.bytes_written, 4);
        assert!(summary.errors.is_empty());
        assert_eq!(fs::read_to_string(out.join("a.md")).unwrap(), "a.md");
        assert!(!out.join("b.md").exists());
        assert!(!out.join("c.md").exists());
    }

    #[test]
    fn test_apply_rejects_duplicate_destination() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let op = |from: &str| WriteOp::Write {
            from: rel(from),
            to: rel("same.md"),
            content: String::new(),
        };
        let set = WriteSet {
            ops: vec![op("a.md"), op("b.md")],
            ..WriteSet::default()
        };

        let err = apply(&set, source.path(), target.path(), &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, RunError::Collision { .. }));
    }
}
