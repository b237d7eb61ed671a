//! Corpus-relative path identity and the shared resolution algorithm.
//!
//! Every file in a corpus is identified by a [`RelPath`]: a `/`-separated,
//! normalized path relative to the corpus root. Both the validator and the
//! rewrite engine resolve link targets through [`resolve`], so a link that
//! checks as valid is exactly a link the rewriter knows how to relocate.

use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors produced while normalizing or resolving a relative path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// `..` climbed above the corpus root
    #[error("path escapes the corpus root")]
    OutsideCorpus,
    /// Nothing remained after normalization (the corpus root itself)
    #[error("path resolves to the corpus root, not a file")]
    Empty,
}

/// Normalized path relative to the corpus root.
///
/// Components are never empty, `.` or `..`. Equality and ordering are plain,
/// case-sensitive string comparison of the `/`-joined form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Normalize a `/`- or `\`-separated relative path.
    ///
    /// # Example
    ///
    /// ```
    /// use docnorm::path::RelPath;
    ///
    /// let path = RelPath::new("docs/./guides/../intro.md").unwrap();
    /// assert_eq!(path.as_str(), "docs/intro.md");
    /// assert!(RelPath::new("../outside.md").is_err());
    /// ```
    pub fn new(path: &str) -> Result<Self, ResolveError> {
        normalize(Vec::new(), path)
    }

    /// Convert a filesystem path that is already relative to the corpus root.
    ///
    /// Returns `None` for paths that are not valid UTF-8 or contain anything
    /// other than normal components.
    pub fn from_fs_path(path: &Path) -> Option<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last component
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension of the last component, without the dot
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Containing directory, or `None` for a top-level entry
    pub fn parent(&self) -> Option<RelPath> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Append a single clean segment.
    pub fn join(&self, segment: &str) -> RelPath {
        Self(format!("{}/{}", self.0, segment))
    }

    /// Build a path from a parent directory (`None` = root) and one segment.
    pub fn child_of(parent: Option<&RelPath>, segment: &str) -> RelPath {
        match parent {
            Some(dir) => dir.join(segment),
            None => Self(segment.to_string()),
        }
    }

    /// Absolute location of this path under `root`
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in self.components() {
            path.push(component);
        }
        path
    }

    /// Relative reference from directory `from_dir` (`None` = corpus root)
    /// to this path.
    ///
    /// ```
    /// use docnorm::path::RelPath;
    ///
    /// let target = RelPath::new("media/logo.png").unwrap();
    /// let from = RelPath::new("docs/guides").unwrap();
    /// assert_eq!(target.relative_from(Some(&from)), "../../media/logo.png");
    /// assert_eq!(target.relative_from(None), "media/logo.png");
    /// ```
    pub fn relative_from(&self, from_dir: Option<&RelPath>) -> String {
        let target: Vec<&str> = self.components().collect();
        let base: Vec<&str> = from_dir.map(|d| d.components().collect()).unwrap_or_default();

        let common = target
            .iter()
            .zip(base.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = std::iter::repeat("..").take(base.len() - common).collect();
        parts.extend_from_slice(&target[common..]);
        parts.join("/")
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve an already-decoded link path as written in `source`.
///
/// Paths starting with `/` are root-relative; everything else is relative to
/// the directory containing `source`. Matching against the inventory is left
/// to the caller and must stay exact.
pub fn resolve(source: &RelPath, target: &str) -> Result<RelPath, ResolveError> {
    if let Some(rooted) = target.strip_prefix('/') {
        return normalize(Vec::new(), rooted);
    }
    let base = source
        .parent()
        .map(|dir| dir.components().map(str::to_string).collect())
        .unwrap_or_default();
    normalize(base, target)
}

fn normalize(mut stack: Vec<String>, path: &str) -> Result<RelPath, ResolveError> {
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop().ok_or(ResolveError::OutsideCorpus)?;
            }
            name => stack.push(name.to_string()),
        }
    }
    if stack.is_empty() {
        return Err(ResolveError::Empty);
    }
    Ok(RelPath(stack.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(path: &str) -> RelPath {
        RelPath::new(path).unwrap()
    }

    #[test]
    fn test_new_normalizes_separators_and_dots() {
        assert_eq!(rel("a\\b\\c.md").as_str(), "a/b/c.md");
        assert_eq!(rel("./a//b/./c.md").as_str(), "a/b/c.md");
        assert_eq!(rel("a/b/../c.md").as_str(), "a/c.md");
    }

    #[test]
    fn test_new_rejects_escape_and_empty() {
        assert_eq!(RelPath::new("a/../../b"), Err(ResolveError::OutsideCorpus));
        assert_eq!(RelPath::new("./"), Err(ResolveError::Empty));
    }

    #[test]
    fn test_parent_file_name_extension() {
        let path = rel("docs/guide/intro.md");
        assert_eq!(path.parent(), Some(rel("docs/guide")));
        assert_eq!(path.file_name(), "intro.md");
        assert_eq!(path.extension(), Some("md"));
        assert_eq!(rel("README").extension(), None);
        assert_eq!(rel(".gitignore").extension(), None);
        assert_eq!(rel("README.md").parent(), None);
    }

    #[test]
    fn test_from_fs_path() {
        assert_eq!(
            RelPath::from_fs_path(Path::new("docs/a b.md")),
            Some(rel("docs/a b.md"))
        );
        assert_eq!(RelPath::from_fs_path(Path::new("/abs/file.md")), None);
        assert_eq!(RelPath::from_fs_path(Path::new("../up.md")), None);
    }

    #[test]
    fn test_resolve_relative_to_source_directory() {
        let source = rel("docs/guide/intro.md");
        assert_eq!(resolve(&source, "setup.md"), Ok(rel("docs/guide/setup.md")));
        assert_eq!(resolve(&source, "./img/a.png"), Ok(rel("docs/guide/img/a.png")));
        assert_eq!(resolve(&source, "../../README.md"), Ok(rel("README.md")));
        assert_eq!(
            resolve(&source, "../../../etc/passwd"),
            Err(ResolveError::OutsideCorpus)
        );
    }

    #[test]
    fn test_resolve_root_relative() {
        let source = rel("docs/guide/intro.md");
        assert_eq!(resolve(&source, "/media/a.png"), Ok(rel("media/a.png")));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let source = rel("index.md");
        assert_ne!(resolve(&source, "Readme.md"), Ok(rel("README.md")));
    }

    #[test]
    fn test_relative_from_siblings_and_cousins() {
        let target = rel("sub-dir/My Page.md");
        assert_eq!(target.relative_from(Some(&rel("sub-dir"))), "My Page.md");
        assert_eq!(target.relative_from(Some(&rel("other/deep"))), "../../sub-dir/My Page.md");
        assert_eq!(rel("index.md").relative_from(Some(&rel("a"))), "../index.md");
    }
}
