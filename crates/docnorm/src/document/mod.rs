//! Document loading, link extraction and link-graph validation
//!
//! Format-specific parsing lives behind [`DocFormatAdapter`]; everything
//! downstream works on [`Document`] values holding the content and the
//! positioned links found in it.

mod adapter;
mod link_validator;
mod links;

pub use adapter::{AdapterRegistry, DocFormatAdapter, MarkdownAdapter};
pub use link_validator::{
    validate, BrokenFile, BrokenLink, Classification, LinkReference, LinkValidator, Report, Stats,
};
pub use links::{
    has_unescaped_parens, parse_target, BrokenReason, ExtractedLink, LinkKind, ParsedTarget, Span,
};

use crate::errors::FileError;
use crate::path::RelPath;
use crate::scan::Inventory;
use tracing::{debug, info, warn};

/// A markdown file's content and the links found in it
#[derive(Debug, Clone)]
pub struct Document {
    pub path: RelPath,
    pub content: String,
    pub links: Vec<ExtractedLink>,
}

/// Result of reading every markdown file of an inventory
#[derive(Debug, Default)]
pub struct Extraction {
    /// Readable documents, in inventory order
    pub documents: Vec<Document>,
    /// Files that could not be read as UTF-8 text
    pub errors: Vec<FileError>,
}

/// Read and parse every markdown file in the inventory.
///
/// Files no adapter claims are ignored; unreadable files are recorded and
/// excluded from further analysis.
pub fn extract_documents(inventory: &Inventory, registry: &AdapterRegistry) -> Extraction {
    let mut extraction = Extraction::default();

    for record in inventory.markdown_files() {
        let Some(adapter) = registry.resolve(record.path.as_str()) else {
            continue;
        };
        let full_path = record.path.to_fs_path(inventory.root());
        let content = match std::fs::read_to_string(&full_path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %record.path, error = %err, "cannot read document");
                extraction.errors.push(FileError::for_path(&record.path, err));
                continue;
            }
        };

        let links = adapter.extract_links(&content);
        debug!(path = %record.path, adapter = adapter.id(), links = links.len(), "extracted links");
        extraction.documents.push(Document {
            path: record.path.clone(),
            content,
            links,
        });
    }

    info!(
        documents = extraction.documents.len(),
        errors = extraction.errors.len(),
        "extracted links"
    );
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::errors::ItemError;
    use crate::scan::scan;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_documents_reads_markdown_only() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "[b](b.md) ![i](i.png)").unwrap();
        fs::write(temp.path().join("b.md"), "no links").unwrap();
        fs::write(temp.path().join("i.png"), [0x89, 0x50]).unwrap();

        let inventory = scan(temp.path(), &Config::default(), None).unwrap();
        let extraction = extract_documents(&inventory, &AdapterRegistry::with_builtins());

        assert_eq!(extraction.documents.len(), 2);
        assert!(extraction.errors.is_empty());
        let document = |path: &str| {
            let path = RelPath::new(path).unwrap();
            extraction.documents.iter().find(|doc| doc.path == path).unwrap()
        };
        assert_eq!(document("a.md").links.len(), 2);
        assert!(document("b.md").links.is_empty());
    }

    #[test]
    fn test_non_utf8_document_is_recorded() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.md"), [0xff, 0xfe, b'[']).unwrap();

        let inventory = scan(temp.path(), &Config::default(), None).unwrap();
        let extraction = extract_documents(&inventory, &AdapterRegistry::with_builtins());

        assert!(extraction.documents.is_empty());
        assert_eq!(extraction.errors.len(), 1);
        assert_eq!(extraction.errors[0].path, "bad.md");
        assert!(matches!(extraction.errors[0].error, ItemError::Io { .. }));
    }
}
