//! Structured output formatting for CLI commands.
//!
//! Every command prints either human-readable text or a JSON envelope with
//! metadata, so scripts get the same information a person reads.

use crate::errors::RunError;
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt::Display;
use std::io::{self, Write};

/// Version of the JSON output format
const OUTPUT_VERSION: &str = "0.1.0";

// ============================================================================
// Output Context for Quiet Mode
// ============================================================================

/// Context for controlling output verbosity
pub struct OutputContext {
    quiet: bool,
    json: bool,
}

impl OutputContext {
    /// Create a new output context
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Print essential output (always shown unless --json)
    pub fn print_data(&self, msg: impl Display) -> io::Result<()> {
        if !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print informational message (suppressed by --quiet or --json)
    pub fn print_info(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print warning (suppressed by --quiet or --json)
    pub fn print_warning(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe_stderr(&format!("Warning: {}", msg))
        } else {
            Ok(())
        }
    }

    /// Print a JSON document (only in --json mode)
    pub fn print_json(&self, json: &str) -> io::Result<()> {
        if self.json {
            writeln_safe(json)
        } else {
            Ok(())
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Safe println that handles broken pipes gracefully
fn writeln_safe(msg: &str) -> io::Result<()> {
    match writeln!(io::stdout(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // Expected when piping to head and friends
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

/// Safe eprintln that handles broken pipes gracefully
fn writeln_safe_stderr(msg: &str) -> io::Result<()> {
    match writeln!(io::stderr(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
        Err(e) => Err(e),
    }
}

// ============================================================================
// JSON Output Types
// ============================================================================

/// Wrapper for successful command output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: Metadata,
}

impl<T: Serialize> JsonOutput<T> {
    /// Create a new output with the given data.
    ///
    /// `success` reports whether the command fully succeeded; a check with
    /// broken links still returns its report, with `success: false`.
    pub fn new(success: bool, data: T, command: impl Into<String>) -> Self {
        Self {
            success,
            data,
            metadata: Metadata::new(command),
        }
    }

    /// Serialize to JSON string with pretty formatting
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Wrapper for error output with suggestions
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: Metadata,
}

impl JsonError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
                suggestions: Vec::new(),
            },
            metadata: Metadata::new(command),
        }
    }

    /// Build the JSON form of a fatal run error.
    pub fn from_run_error(err: &RunError, command: impl Into<String>) -> Self {
        let error = Self::new(ErrorCode::for_run_error(err), err.to_string(), command);
        match err {
            RunError::Collision {
                destination,
                first,
                second,
            } => error.with_details(serde_json::json!({
                "destination": destination,
                "first": first,
                "second": second,
            })),
            RunError::SourceMissing(path) => error
                .with_details(serde_json::json!({ "source": path.display().to_string() }))
                .with_suggestion("Pass the directory that contains the exported pages"),
            RunError::TargetIsSource(_) => {
                error.with_suggestion("Choose a target directory outside the source tree")
            }
            _ => error,
        }
    }

    /// Add details to the error
    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Add a suggestion to the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestions.push(suggestion.into());
        self
    }

    /// Serialize to JSON string with pretty formatting
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Error details including code, message, and suggestions
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (e.g., "SOURCE_NOT_FOUND", "COLLISION")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Suggested actions to resolve the error
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Metadata attached to every JSON response
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// Timestamp when the response was generated
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    /// Version of the output format
    pub version: String,
    /// Command that generated this response
    pub command: String,
}

impl Metadata {
    fn new(command: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: OUTPUT_VERSION.to_string(),
            command: command.into(),
        }
    }
}

/// Serialize timestamp in ISO 8601 format
fn serialize_timestamp<S>(dt: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Standardized exit codes for the docnorm CLI
///
/// # Examples
///
/// ```rust
/// use docnorm::ExitCode;
///
/// assert_eq!(ExitCode::Success.code(), 0);
/// assert_eq!(ExitCode::ValidationFailed.code(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded (0)
    Success = 0,

    /// Generic error (1)
    GenericError = 1,

    /// Invalid arguments or usage error (2)
    InvalidArgument = 2,

    /// Source directory not found (3)
    NotFound = 3,

    /// Broken links found, or conversion finished with per-file errors (4)
    ValidationFailed = 4,

    /// Permission denied (5)
    PermissionDenied = 5,

    /// File system failure (10)
    ExternalError = 10,
}

impl ExitCode {
    /// Every exit code, in numeric order
    pub const ALL: [ExitCode; 7] = [
        ExitCode::Success,
        ExitCode::GenericError,
        ExitCode::InvalidArgument,
        ExitCode::NotFound,
        ExitCode::ValidationFailed,
        ExitCode::PermissionDenied,
        ExitCode::ExternalError,
    ];

    /// Convert exit code to i32 for `std::process::exit`
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Command succeeded",
            ExitCode::GenericError => "Generic error occurred",
            ExitCode::InvalidArgument => "Invalid arguments or configuration",
            ExitCode::NotFound => "Source directory not found",
            ExitCode::ValidationFailed => "Broken links found or files failed to convert",
            ExitCode::PermissionDenied => "Permission denied",
            ExitCode::ExternalError => "File system error",
        }
    }
}

// ============================================================================
// Error Codes (String constants for JSON responses)
// ============================================================================

/// Standard error codes for docnorm failures (JSON format)
pub struct ErrorCode;

impl ErrorCode {
    pub const SOURCE_NOT_FOUND: &'static str = "SOURCE_NOT_FOUND";
    pub const INVALID_ARGUMENT: &'static str = "INVALID_ARGUMENT";
    pub const INVALID_CONFIG: &'static str = "INVALID_CONFIG";
    pub const VALIDATION_FAILED: &'static str = "VALIDATION_FAILED";
    pub const PERMISSION_DENIED: &'static str = "PERMISSION_DENIED";
    pub const COLLISION: &'static str = "COLLISION";
    pub const IO_ERROR: &'static str = "IO_ERROR";

    /// Map error code string to exit code
    pub fn to_exit_code(code: &str) -> ExitCode {
        match code {
            Self::SOURCE_NOT_FOUND => ExitCode::NotFound,
            Self::INVALID_ARGUMENT | Self::INVALID_CONFIG => ExitCode::InvalidArgument,
            Self::VALIDATION_FAILED => ExitCode::ValidationFailed,
            Self::PERMISSION_DENIED => ExitCode::PermissionDenied,
            Self::IO_ERROR => ExitCode::ExternalError,
            _ => ExitCode::GenericError,
        }
    }

    pub fn for_run_error(err: &RunError) -> &'static str {
        let io_code = |source: &io::Error| match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PERMISSION_DENIED,
            _ => Self::IO_ERROR,
        };
        match err {
            RunError::SourceMissing(_) => Self::SOURCE_NOT_FOUND,
            RunError::SourceNotDirectory(_)
            | RunError::TargetIsSource(_)
            | RunError::MissingPath(_) => Self::INVALID_ARGUMENT,
            RunError::SourceUnreadable { source, .. } => io_code(source),
            RunError::TargetUnwritable { source, .. } => io_code(source),
            RunError::Collision { .. } => Self::COLLISION,
            RunError::InvalidConfig(_) => Self::INVALID_CONFIG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::RelPath;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_json_output_success() {
        let output = JsonOutput::new(true, json!({"mapped": 3}), "convert");

        assert!(output.success);
        assert_eq!(output.data["mapped"], 3);
        assert_eq!(output.metadata.version, "0.1.0");
        assert_eq!(output.metadata.command, "convert");
    }

    #[test]
    fn test_json_output_serialization() {
        let output = JsonOutput::new(false, json!({"broken": 2}), "check");

        let json_str = output.to_json_string().unwrap();
        assert!(json_str.contains("\"success\": false"));
        assert!(json_str.contains("\"broken\": 2"));
        assert!(json_str.contains("\"timestamp\":"));
        assert!(json_str.contains("\"command\": \"check\""));
    }

    #[test]
    fn test_json_error_from_collision() {
        let err = RunError::Collision {
            destination: RelPath::new("a.md").unwrap(),
            first: RelPath::new("a 0123456789abcdef.md").unwrap(),
            second: RelPath::new("a fedcba9876543210.md").unwrap(),
        };
        let error = JsonError::from_run_error(&err, "convert");

        assert!(!error.success);
        assert_eq!(error.error.code, "COLLISION");
        assert_eq!(error.error.details.as_ref().unwrap()["destination"], "a.md");
        assert_eq!(ErrorCode::to_exit_code(&error.error.code), ExitCode::GenericError);
    }

    #[test]
    fn test_run_error_exit_codes() {
        let code = |err: &RunError| ErrorCode::to_exit_code(ErrorCode::for_run_error(err));

        assert_eq!(code(&RunError::SourceMissing(PathBuf::from("x"))), ExitCode::NotFound);
        assert_eq!(
            code(&RunError::TargetIsSource(PathBuf::from("x"))),
            ExitCode::InvalidArgument
        );
        assert_eq!(
            code(&RunError::TargetUnwritable {
                path: PathBuf::from("x"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }),
            ExitCode::PermissionDenied
        );
        assert_eq!(
            code(&RunError::SourceUnreadable {
                path: PathBuf::from("x"),
                source: io::Error::other("boom"),
            }),
            ExitCode::ExternalError
        );
        assert_eq!(
            code(&RunError::InvalidConfig("bad".into())),
            ExitCode::InvalidArgument
        );
    }
}
