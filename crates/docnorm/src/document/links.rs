//! Link occurrences and link-target parsing.

use percent_encoding::percent_decode_str;
use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// URI scheme prefix such as `https:`, `mailto:` or `data:`
static SCHEME_REGEX: OnceLock<Regex> = OnceLock::new();

fn scheme_regex() -> &'static Regex {
    SCHEME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("Scheme regex should compile")
    })
}

/// Syntax a link was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// `[text](target)`
    Inline,
    /// `![alt](target)`
    Image,
}

/// Byte range into a document's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One link occurrence, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ExtractedLink {
    pub kind: LinkKind,
    pub text: String,
    /// Target exactly as written, including any angle brackets
    pub raw_target: String,
    /// Location of `raw_target` in the content
    pub span: Span,
    /// 1-based line number
    pub line: usize,
}

/// Why a reference does not resolve
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BrokenReason {
    #[error("target not found in corpus")]
    NotFound,
    #[error("target resolves outside the corpus")]
    OutsideCorpus,
    #[error("empty link target")]
    EmptyTarget,
    #[error("target is not valid percent-encoded UTF-8")]
    InvalidEncoding,
}

/// A link target split into the parts that matter for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTarget {
    /// Has a URI scheme or is protocol-relative
    External,
    /// Only a `#fragment` and/or `?query`
    Fragment,
    /// A file reference
    Path {
        /// Percent-decoded path, still relative (or `/`-rooted) as written
        path: String,
        /// Raw `?query#fragment` suffix, empty when absent
        suffix: String,
    },
}

/// Parse a raw link target.
///
/// ```
/// use docnorm::document::{parse_target, ParsedTarget};
///
/// assert_eq!(
///     parse_target("./sub%20dir/My%20Page.md#intro").unwrap(),
///     ParsedTarget::Path {
///         path: "./sub dir/My Page.md".to_string(),
///         suffix: "#intro".to_string(),
///     }
/// );
/// assert_eq!(parse_target("https://example.com").unwrap(), ParsedTarget::External);
/// assert_eq!(parse_target("#top").unwrap(), ParsedTarget::Fragment);
/// ```
pub fn parse_target(raw: &str) -> Result<ParsedTarget, BrokenReason> {
    let target = strip_angle_brackets(raw.trim());
    if target.is_empty() {
        return Err(BrokenReason::EmptyTarget);
    }
    if target.starts_with("//") || scheme_regex().is_match(target) {
        return Ok(ParsedTarget::External);
    }

    let (path, suffix) = match target.find(['?', '#']) {
        Some(idx) => target.split_at(idx),
        None => (target, ""),
    };
    if path.is_empty() {
        return Ok(ParsedTarget::Fragment);
    }

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| BrokenReason::InvalidEncoding)?;
    Ok(ParsedTarget::Path {
        path: decoded.into_owned(),
        suffix: suffix.to_string(),
    })
}

/// Whether the raw target, as written, carries parentheses outside of an
/// angle-bracket destination. Such targets cannot be rewritten safely.
pub fn has_unescaped_parens(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return false;
    }
    trimmed.contains(['(', ')'])
}

fn strip_angle_brackets(target: &str) -> &str {
    target
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .map(str::trim)
        .unwrap_or(target)
}
