//! Path segment sanitization.
//!
//! Export tools append opaque identifiers to page titles
//! (`Meeting Notes 3f9a1c2b-44de-4abc-9876-0123456789ab.md`) and happily emit
//! characters that are invalid on common filesystems. [`clean_segment`] turns a
//! single segment into a portable name; [`sanitize`] additionally resolves
//! collisions against the names already taken in the same directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Characters rejected by at least one common filesystem. Replaced by `-`.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\', '/'];

/// Matches identifier suffixes left by the export tool: UUIDs (with or
/// without hyphens), 16-digit hex tokens and parenthesised hex runs.
static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> &'static Regex {
    IDENTIFIER_REGEX.get_or_init(|| {
        Regex::new(
            r"\s*\b(?:[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}|[0-9a-f]{16})\b|\s+\([0-9a-f]{3,}\)",
        )
        .expect("Identifier regex should compile")
    })
}

/// Whether a segment names a directory or a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Whitespace becomes `-`, no extension handling
    Directory,
    /// Whitespace collapses to single spaces, the extension is preserved
    File,
}

/// Tunables for segment cleaning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Drop every non-ASCII character
    pub ascii_only: bool,
    /// Name used when nothing readable survives cleaning
    pub fallback_name: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            ascii_only: false,
            fallback_name: "untitled".to_string(),
        }
    }
}

/// Per-segment sanitization failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("character U+{code:04X} cannot be stripped without ambiguity")]
    InvalidCharacter { code: u32 },
}

/// Clean one path segment without collision handling.
///
/// The result is a fixpoint: cleaning it again returns it unchanged.
///
/// # Example
///
/// ```
/// use docnorm::sanitize::{clean_segment, SanitizeOptions, SegmentKind};
///
/// let options = SanitizeOptions::default();
/// let name = clean_segment(
///     "Meeting Notes 3f9a1c2b-44de-4abc-9876-0123456789ab.md",
///     SegmentKind::File,
///     &options,
/// )
/// .unwrap();
/// assert_eq!(name, "Meeting Notes.md");
///
/// let dir = clean_segment("sub dir", SegmentKind::Directory, &options).unwrap();
/// assert_eq!(dir, "sub-dir");
/// ```
pub fn clean_segment(
    segment: &str,
    kind: SegmentKind,
    options: &SanitizeOptions,
) -> Result<String, SanitizeError> {
    // A changing pass shortens the name, apart from the one-time ellipsis
    // expansion and fallback substitution, so this terminates.
    let mut current = clean_once(segment, kind, options)?;
    loop {
        let next = clean_once(&current, kind, options)?;
        if next == current {
            return Ok(current);
        }
        current = next;
    }
}

/// Clean a segment and make it unique within `seen`.
///
/// `seen` holds every name already assigned in the target directory. On
/// collision `-2`, `-3`, ... is appended before the extension; the chosen
/// name is inserted into `seen`.
pub fn sanitize(
    segment: &str,
    kind: SegmentKind,
    seen: &mut HashSet<String>,
    options: &SanitizeOptions,
) -> Result<String, SanitizeError> {
    let cleaned = clean_segment(segment, kind, options)?;
    Ok(claim_unique(cleaned, kind, seen))
}

/// Reserve `name` in `seen`, disambiguating with a numeric suffix if taken.
pub(crate) fn claim_unique(name: String, kind: SegmentKind, seen: &mut HashSet<String>) -> String {
    if seen.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = split_name(&name, kind);
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn clean_once(
    segment: &str,
    kind: SegmentKind,
    options: &SanitizeOptions,
) -> Result<String, SanitizeError> {
    if let Some(bad) = segment.chars().find(|c| is_ambiguous(*c)) {
        return Err(SanitizeError::InvalidCharacter { code: bad as u32 });
    }

    let (stem, ext) = split_name(segment, kind);
    let stem = clean_text(stem, kind, options);
    let stem = if stem.is_empty() || stem == "." || stem == ".." {
        options.fallback_name.clone()
    } else {
        stem
    };

    Ok(match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    })
}

/// Lossy-decoding artifacts and bidi controls: removing them silently could
/// turn two distinct names into one, or change what a reader sees.
fn is_ambiguous(c: char) -> bool {
    c == '\u{FFFD}' || ('\u{202A}'..='\u{202E}').contains(&c) || ('\u{2066}'..='\u{2069}').contains(&c)
}

/// Split a file name into stem and a plain alphanumeric extension.
fn split_name(name: &str, kind: SegmentKind) -> (&str, Option<&str>) {
    if kind == SegmentKind::Directory {
        return (name, None);
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                (&name[..idx], Some(ext))
            } else {
                (name, None)
            }
        }
        _ => (name, None),
    }
}

fn clean_text(text: &str, kind: SegmentKind, options: &SanitizeOptions) -> String {
    let text = text.replace("â€¦", "...").replace('\u{2026}', "...");

    let replaced: String = text
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| !options.ascii_only || c.is_ascii())
        .map(|c| if INVALID_CHARS.contains(&c) { '-' } else { c })
        .collect();

    let stripped = identifier_regex().replace_all(&replaced, |caps: &Captures| {
        let matched = &caps[0];
        // All-decimal runs such as ` (2024)` are part of the title.
        if matched.bytes().any(|b| matches!(b, b'a'..=b'f')) {
            String::new()
        } else {
            matched.to_string()
        }
    });

    let separator = match kind {
        SegmentKind::Directory => "-",
        SegmentKind::File => " ",
    };
    let spaced = stripped.split_whitespace().collect::<Vec<_>>().join(separator);

    let mut collapsed = String::with_capacity(spaced.len());
    for c in spaced.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}
