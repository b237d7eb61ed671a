//! Configuration file loading and parsing.
//!
//! docnorm reads an optional `docnorm.toml` from the working directory (or the
//! path given with `--config`). Every key is optional; missing values fall back
//! to the defaults below, and command-line flags override file values.
//!
//! ```toml
//! source = "Export"
//! target = "Docs"
//!
//! [scan]
//! exclude_dirs = [".git", "node_modules"]
//! media_extensions = ["png", "jpg", "mp4"]
//!
//! [convert]
//! extensions = ["md", "png", "jpg"]
//!
//! [sanitize]
//! ascii_only = false
//! fallback_name = "untitled"
//! ```

use crate::errors::RunError;
use crate::sanitize::SanitizeOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "docnorm.toml";

const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".hg", ".svn"];

const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "mp4", "mov", "webm", "mp3", "wav", "pdf",
    "csv",
];

const DEFAULT_CONVERT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "png", "jpg", "jpeg", "gif", "svg", "mp4", "mov", "csv",
];

/// Root configuration structure loaded from `docnorm.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Source root of the exported tree (optional).
    pub source: Option<PathBuf>,
    /// Target root for converted output (optional).
    pub target: Option<PathBuf>,
    /// Corpus scanning configuration (optional).
    pub scan: Option<ScanConfig>,
    /// Conversion configuration (optional).
    pub convert: Option<ConvertConfig>,
    /// Name sanitization configuration (optional).
    pub sanitize: Option<SanitizeConfig>,
}

/// Corpus scanning configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanConfig {
    /// Directory names pruned from the walk (default: VCS metadata).
    pub exclude_dirs: Option<Vec<String>>,
    /// Extensions classified as media (default: common image/video/audio).
    pub media_extensions: Option<Vec<String>>,
}

/// Conversion configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertConfig {
    /// Extension allow-list of files copied into the target tree.
    pub extensions: Option<Vec<String>>,
}

/// Name sanitization configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SanitizeConfig {
    /// Drop all non-ASCII characters (default: false).
    pub ascii_only: Option<bool>,
    /// Replacement for names that clean to nothing (default: "untitled").
    pub fallback_name: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `docnorm.toml` in `dir` if present, else defaults.
    ///
    /// An explicitly requested file must exist.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = dir.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), RunError> {
        if let Some(name) = self.sanitize.as_ref().and_then(|s| s.fallback_name.as_deref()) {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(RunError::InvalidConfig(format!(
                    "sanitize.fallback_name must be a non-empty single path segment, got '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Directory names pruned while scanning.
    pub fn exclude_dirs(&self) -> Vec<String> {
        self.scan
            .as_ref()
            .and_then(|s| s.exclude_dirs.clone())
            .unwrap_or_else(|| to_strings(DEFAULT_EXCLUDE_DIRS))
    }

    /// Lowercased extensions classified as media.
    pub fn media_extensions(&self) -> Vec<String> {
        self.scan
            .as_ref()
            .and_then(|s| s.media_extensions.clone())
            .map(lowercase_all)
            .unwrap_or_else(|| to_strings(DEFAULT_MEDIA_EXTENSIONS))
    }

    /// Lowercased extensions copied by the converter.
    pub fn convert_extensions(&self) -> Vec<String> {
        self.convert
            .as_ref()
            .and_then(|c| c.extensions.clone())
            .map(lowercase_all)
            .unwrap_or_else(|| to_strings(DEFAULT_CONVERT_EXTENSIONS))
    }

    /// Whether a file extension is on the conversion allow-list.
    pub fn is_convertible(&self, extension: Option<&str>) -> bool {
        match extension {
            Some(ext) => self
                .convert_extensions()
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Sanitizer options with defaults applied.
    pub fn sanitize_options(&self) -> SanitizeOptions {
        let defaults = SanitizeOptions::default();
        match &self.sanitize {
            Some(s) => SanitizeOptions {
                ascii_only: s.ascii_only.unwrap_or(defaults.ascii_only),
                fallback_name: s.fallback_name.clone().unwrap_or(defaults.fallback_name),
            },
            None => defaults,
        }
    }

    /// Add directory names to the exclusion list (CLI `--exclude`).
    pub fn add_excludes(&mut self, dirs: &[String]) {
        if dirs.is_empty() {
            return;
        }
        let mut all = self.exclude_dirs();
        for dir in dirs {
            if !all.contains(dir) {
                all.push(dir.clone());
            }
        }
        self.scan.get_or_insert_with(ScanConfig::default).exclude_dirs = Some(all);
    }

    /// Force ASCII-only sanitization (CLI `--ascii-only`).
    pub fn set_ascii_only(&mut self) {
        self.sanitize
            .get_or_insert_with(SanitizeConfig::default)
            .ascii_only = Some(true);
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn lowercase_all(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim_start_matches('.').to_lowercase())
        .collect()
}
