//! Document format adapter trait and registry
//!
//! Each document format implements [`DocFormatAdapter`] to expose the link
//! occurrences the validator and rewrite engine work on. Only Markdown ships
//! today.

use super::links::{ExtractedLink, LinkKind, Span};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Inline link or image: `[text](dest)` / `![alt](dest)`.
///
/// `dest` is either an angle-bracket destination (spaces and parentheses
/// allowed), optionally followed by a title, or everything up to the first
/// `)` on the line.
static LINK_REGEX: OnceLock<Regex> = OnceLock::new();

/// Trailing link title: `"title"` or `'title'` separated by whitespace
static TITLE_REGEX: OnceLock<Regex> = OnceLock::new();

fn link_regex() -> &'static Regex {
    LINK_REGEX.get_or_init(|| {
        Regex::new(r"(!?)\[([^\[\]\n]*)\]\((<[^>\n]*>[^)\n]*|[^)\n]*)\)")
            .expect("Link regex should compile")
    })
}

fn title_regex() -> &'static Regex {
    TITLE_REGEX.get_or_init(|| {
        Regex::new(r#"\s+(?:"[^"]*"|'[^']*')\s*$"#).expect("Title regex should compile")
    })
}

/// Trait for document format adapters
///
/// # Example
///
/// ```
/// use docnorm::document::{DocFormatAdapter, MarkdownAdapter};
///
/// let adapter = MarkdownAdapter;
/// assert_eq!(adapter.id(), "markdown");
/// assert!(adapter.supports_path("readme.md"));
///
/// let links = adapter.extract_links("See [guide](docs/guide.md).");
/// assert_eq!(links[0].raw_target, "docs/guide.md");
/// ```
pub trait DocFormatAdapter {
    /// Returns the adapter identifier (e.g., "markdown")
    fn id(&self) -> &str;

    /// Check if this adapter supports the given file path based on extension
    fn supports_path(&self, path: &str) -> bool;

    /// Every link occurrence in `content`, in discovery order, with the byte
    /// span of its raw target.
    fn extract_links(&self, content: &str) -> Vec<ExtractedLink>;
}

/// Registry for managing document format adapters
///
/// # Example
///
/// ```
/// use docnorm::document::AdapterRegistry;
///
/// let registry = AdapterRegistry::with_builtins();
/// assert_eq!(registry.resolve("notes/Page.MD").unwrap().id(), "markdown");
/// assert!(registry.resolve("image.png").is_none());
/// ```
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn DocFormatAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Create a registry with built-in adapters registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MarkdownAdapter));
        registry
    }

    /// Register a format adapter
    pub fn register(&mut self, adapter: Box<dyn DocFormatAdapter>) {
        self.adapters.push(adapter);
    }

    /// First adapter that claims `path`
    pub fn resolve(&self, path: &str) -> Option<&dyn DocFormatAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.supports_path(path))
            .map(|adapter| adapter.as_ref())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Markdown format adapter
///
/// Supports `.md` and `.markdown` files.
///
/// # Recognized
///
/// - Links: `[text](path)`, `[text](path "title")`
/// - Images: `![alt](path)`
/// - Angle-bracket destinations: `[text](<path with spaces (1).md>)`
///
/// # Not recognized
///
/// - Reference-style links (`[text][ref]`) and autolinks (`<https://...>`)
/// - Raw HTML (`<img src=...>`)
/// - Links spanning lines or link text containing brackets
///
/// Fenced and indented code blocks are not special-cased.
pub struct MarkdownAdapter;

impl DocFormatAdapter for MarkdownAdapter {
    fn id(&self) -> &str {
        "markdown"
    }

    fn supports_path(&self, path: &str) -> bool {
        match Path::new(path).extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_lowercase();
                ext == "md" || ext == "markdown"
            }
            None => false,
        }
    }

    fn extract_links(&self, content: &str) -> Vec<ExtractedLink> {
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();

        let mut links = Vec::new();
        for cap in link_regex().captures_iter(content) {
            let (Some(bang), Some(text), Some(dest)) = (cap.get(1), cap.get(2), cap.get(3)) else {
                continue;
            };

            let (offset, len) = target_bounds(dest.as_str());
            let start = dest.start() + offset;
            let end = start + len;
            let line = line_starts.partition_point(|&line_start| line_start <= start);

            links.push(ExtractedLink {
                kind: if bang.as_str().is_empty() {
                    LinkKind::Inline
                } else {
                    LinkKind::Image
                },
                text: text.as_str().to_string(),
                raw_target: content[start..end].to_string(),
                span: Span { start, end },
                line,
            });
        }
        links
    }
}

/// Offset and length of the target inside a link destination, with
/// surrounding whitespace and any title removed.
fn target_bounds(dest: &str) -> (usize, usize) {
    let trimmed = dest.trim_start();
    let offset = dest.len() - trimmed.len();

    if trimmed.starts_with('<') {
        if let Some(close) = trimmed.find('>') {
            return (offset, close + 1);
        }
    }

    let without_title = match title_regex().find(trimmed) {
        Some(title) => &trimmed[..title.start()],
        None => trimmed,
    };
    (offset, without_title.trim_end().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(content: &str) -> Vec<String> {
        MarkdownAdapter
            .extract_links(content)
            .into_iter()
            .map(|l| l.raw_target)
            .collect()
    }

    #[test]
    fn test_markdown_supports_path() {
        let adapter = MarkdownAdapter;

        assert!(adapter.supports_path("README.md"));
        assert!(adapter.supports_path("docs/guide.md"));
        assert!(adapter.supports_path("file.markdown"));
        assert!(adapter.supports_path("FILE.MD"));

        assert!(!adapter.supports_path("file.txt"));
        assert!(!adapter.supports_path("file"));
    }

    #[test]
    fn test_extract_links_and_images_in_order() {
        let content = "# Doc\n\nImage: ![Logo](./assets/logo.png)\nAnd [Guide](../docs/guide.md) then [x](#top)\n";
        let links = MarkdownAdapter.extract_links(content);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].kind, LinkKind::Image);
        assert_eq!(links[0].text, "Logo");
        assert_eq!(links[0].raw_target, "./assets/logo.png");
        assert_eq!(links[0].line, 3);
        assert_eq!(links[1].kind, LinkKind::Inline);
        assert_eq!(links[1].raw_target, "../docs/guide.md");
        assert_eq!(links[1].line, 4);
        assert_eq!(links[2].raw_target, "#top");
    }

    #[test]
    fn test_spans_point_at_raw_target() {
        let content = "a [b](c.md) d\n[é](ü.md)";
        for link in MarkdownAdapter.extract_links(content) {
            assert_eq!(&content[link.span.start..link.span.end], link.raw_target);
        }
    }

    #[test]
    fn test_titles_are_not_part_of_target() {
        assert_eq!(targets(r#"[a](page.md "Title")"#), vec!["page.md"]);
        assert_eq!(targets("[a](page.md 'Title')"), vec!["page.md"]);
        assert_eq!(targets(r#"[a](<my page.md> "T")"#), vec!["<my page.md>"]);
    }

    #[test]
    fn test_angle_brackets_allow_parens_and_spaces() {
        assert_eq!(targets("[a](<Page (1).md>)"), vec!["<Page (1).md>"]);
        assert_eq!(targets("[a]( spaced.md )"), vec!["spaced.md"]);
    }

    #[test]
    fn test_bare_target_stops_at_first_paren() {
        assert_eq!(targets("[a](Page (1).md)"), vec!["Page (1"]);
    }

    #[test]
    fn test_unrecognized_syntax() {
        assert!(targets("[ref][1]\n\n[1]: page.md").is_empty());
        assert!(targets("<https://example.com>").is_empty());
        assert!(targets("[split\ntext](page.md)").is_empty());
    }

    #[test]
    fn test_empty_target_is_extracted() {
        let links = MarkdownAdapter.extract_links("[empty]()");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].raw_target, "");
        assert_eq!(links[0].span.start, links[0].span.end);
    }
}
