//! Error types for per-file failures and whole-run failures.
//!
//! Per-file problems ([`ItemError`], wrapped with the offending path in
//! [`FileError`]) never abort a run: they accumulate into the run summary.
//! [`RunError`] is reserved for precondition failures and invariant
//! violations, which stop the run. [`ActionableError`] decorates the fatal
//! ones with causes and remedies for the terminal.

use crate::document::BrokenReason;
use crate::path::RelPath;
use crate::sanitize::SanitizeError;
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A recoverable problem with a single file or link
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemError {
    #[error("character U+{code:04X} cannot be stripped without ambiguity")]
    InvalidCharacter { code: u32 },

    #[error("unsupported extension {}", describe_extension(.extension))]
    UnsupportedExtension { extension: Option<String> },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("path is not valid UTF-8")]
    NonUtf8Path,

    #[error("line {line}: target '{target}' contains unescaped parentheses and was not rewritten")]
    UnsafeTarget { line: usize, target: String },

    #[error("line {line}: target '{target}' points at a file that is not converted")]
    TargetNotConverted { line: usize, target: String },

    #[error("line {line}: broken link '{target}' ({reason})")]
    BrokenLink {
        line: usize,
        target: String,
        reason: BrokenReason,
    },
}

fn describe_extension(extension: &Option<String>) -> String {
    match extension {
        Some(ext) => format!("'.{}'", ext),
        None => "(none)".to_string(),
    }
}

impl From<SanitizeError> for ItemError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::InvalidCharacter { code } => ItemError::InvalidCharacter { code },
        }
    }
}

impl From<std::io::Error> for ItemError {
    fn from(err: std::io::Error) -> Self {
        ItemError::Io {
            message: err.to_string(),
        }
    }
}

/// An [`ItemError`] attached to the path it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FileError {
    /// Corpus-relative path (lossy for paths that are not valid UTF-8)
    pub path: String,
    pub error: ItemError,
}

impl FileError {
    pub fn new(path: impl Into<String>, error: impl Into<ItemError>) -> Self {
        Self {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn for_path(path: &RelPath, error: impl Into<ItemError>) -> Self {
        Self::new(path.as_str(), error)
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Failures that abort the whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("failed to read source directory {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("target directory must differ from the source directory: {}", .0.display())]
    TargetIsSource(PathBuf),

    #[error("target directory {} is not writable: {source}", .path.display())]
    TargetUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Two files were assigned the same destination. The mapper guarantees
    /// this cannot happen, so seeing it means the mapping is wrong.
    #[error("collision: '{first}' and '{second}' both map to '{destination}'")]
    Collision {
        destination: RelPath,
        first: RelPath,
        second: RelPath,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required directory was given neither on the command line nor in
    /// the config file
    #[error("no {0} directory given: pass it as an argument or set `{0}` in docnorm.toml")]
    MissingPath(&'static str),
}

impl RunError {
    /// Terminal-friendly explanation with causes and remedies
    pub fn actionable(&self) -> ActionableError {
        match self {
            RunError::SourceMissing(path) => source_missing(path),
            RunError::TargetIsSource(path) => target_is_source(path),
            RunError::TargetUnwritable { path, source } => target_unwritable(path, source),
            RunError::Collision { .. } => ActionableError::new(self.to_string())
                .with_cause("Two original paths sanitized to the same destination")
                .with_remedy("Re-run with --dry-run to inspect the mapping")
                .with_remedy("Report the two paths above; no files were overwritten"),
            other => ActionableError::new(other.to_string()),
        }
    }
}

/// An error with diagnostic context and remediation steps.
///
/// # Example
///
/// ```
/// use docnorm::errors::ActionableError;
///
/// let error = ActionableError::new("Source directory not found: ./export")
///     .with_cause("The export archive may not have been extracted yet")
///     .with_remedy("Pass the directory that contains the exported pages");
///
/// assert!(error.to_error_message().contains("To fix:"));
/// ```
#[derive(Debug, Clone)]
pub struct ActionableError {
    error: String,
    causes: Vec<String>,
    remediation: Vec<String>,
}

impl ActionableError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            causes: Vec::new(),
            remediation: Vec::new(),
        }
    }

    /// Add a possible cause (diagnostic hint).
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a remediation step (actionable fix).
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remediation.push(remedy.into());
        self
    }

    /// Convert to a formatted error message suitable for display.
    pub fn to_error_message(&self) -> String {
        let mut msg = format!("Error: {}\n", self.error);

        if !self.causes.is_empty() {
            msg.push_str("\nPossible causes:\n");
            for cause in &self.causes {
                msg.push_str(&format!("  • {}\n", cause));
            }
        }

        if !self.remediation.is_empty() {
            msg.push_str("\nTo fix:\n");
            for remedy in &self.remediation {
                msg.push_str(&format!("  • {}\n", remedy));
            }
        }

        msg
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_message())
    }
}

impl std::error::Error for ActionableError {}

/// Source root missing: nothing to process.
pub fn source_missing(path: &std::path::Path) -> ActionableError {
    ActionableError::new(format!("Source directory not found: {}", path.display()))
        .with_cause("The path may be misspelled or relative to a different directory")
        .with_cause("The export archive may not have been extracted yet")
        .with_remedy("Check the path: ls -la <source>")
        .with_remedy("Set `source` in docnorm.toml or pass it as the first argument")
}

/// Target and source resolve to the same directory.
pub fn target_is_source(path: &std::path::Path) -> ActionableError {
    ActionableError::new(format!(
        "Target directory is the source directory: {}",
        path.display()
    ))
    .with_cause("Conversion writes a new tree and never edits the source in place")
    .with_remedy("Choose a separate target: docnorm convert <source> <target>")
}

/// Target root cannot be created or written.
pub fn target_unwritable(path: &std::path::Path, err: &std::io::Error) -> ActionableError {
    ActionableError::new(format!("Cannot write target directory: {}", path.display()))
        .with_cause(format!("Filesystem error: {}", err))
        .with_cause("The parent directory may be read-only or owned by another user")
        .with_remedy("Check permissions on the parent directory")
        .with_remedy("Pick a target under a writable location")
}
