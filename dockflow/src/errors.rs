//! Error types for the dockflow pipeline.
//!
//! The taxonomy separates run-fatal errors (configuration, prebuilt layout,
//! duplicate registrations) from per-item errors (`ProcessorError`), which
//! are always absorbed at the stage-runner boundary and recorded against the
//! failing work item instead of aborting the batch.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of stderr bytes carried inside a [`ProcessorError`].
pub const STDERR_EXCERPT_LIMIT: usize = 400;

/// The main error type for dockflow operations.
#[derive(Debug, Error)]
pub enum DockflowError {
    /// A configuration precondition failed before any stage ran.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The input manifest could not be parsed.
    #[error("{0}")]
    Manifest(#[from] ManifestError),

    /// Two registrations shared a work-item key.
    #[error("{0}")]
    DuplicateKey(#[from] DuplicateKeyError),

    /// A prebuilt receptor set is missing required entries.
    #[error("{0}")]
    PrebuiltLayout(#[from] PrebuiltLayoutError),

    /// An external processor invocation failed.
    ///
    /// Only surfaces from adapter helpers used outside a stage runner; the
    /// runner itself converts these into per-item failure records.
    #[error("{0}")]
    Processor(#[from] ProcessorError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when run configuration is invalid.
///
/// Configuration errors are fatal and are raised before any stage runner is
/// constructed, so a misconfigured run never invokes an adapter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    /// The worker count must be at least one.
    #[error("invalid worker count {0}: must be at least 1")]
    InvalidWorkerCount(usize),

    /// A docking box dimension must be a positive, finite number.
    #[error("invalid box dimension {axis}={value}: must be positive and finite")]
    InvalidBoxDimension {
        /// The axis name (`x`, `y`, or `z`).
        axis: char,
        /// The offending value.
        value: f64,
    },

    /// A required input path does not exist.
    #[error("{role} not found: {path}")]
    MissingPath {
        /// What the path was expected to be (e.g. "ligand manifest").
        role: String,
        /// The missing path.
        path: PathBuf,
    },

    /// The protein source directory contains no usable structure files.
    #[error("no structure files with extension .{extension} in {dir}")]
    EmptyInputSet {
        /// The directory that was scanned.
        dir: PathBuf,
        /// The extension that was looked for.
        extension: String,
    },

    /// The per-item timeout must be nonzero.
    #[error("invalid item timeout: must be nonzero")]
    InvalidTimeout,
}

impl ConfigurationError {
    /// Creates a missing-path error.
    #[must_use]
    pub fn missing_path(role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingPath {
            role: role.into(),
            path: path.into(),
        }
    }
}

/// Error raised while parsing the ligand manifest.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ManifestError {
    /// A line did not contain an identifier and a payload.
    ///
    /// Only raised under [`MalformedLinePolicy::Fail`]; the default policy
    /// skips the line with a warning instead.
    ///
    /// [`MalformedLinePolicy::Fail`]: crate::manifest::MalformedLinePolicy::Fail
    #[error("malformed manifest line {line_no}: {content:?}")]
    MalformedLine {
        /// One-based line number.
        line_no: usize,
        /// The offending line content.
        content: String,
    },

    /// The manifest contained no records at all.
    #[error("manifest {path} contains no ligand records")]
    Empty {
        /// The manifest path.
        path: PathBuf,
    },
}

/// Error raised when two registrations share a work-item key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate work-item key: {key}")]
pub struct DuplicateKeyError {
    /// The conflicting key.
    pub key: String,
}

impl DuplicateKeyError {
    /// Creates a new duplicate key error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised at graph construction when a prebuilt receptor directory is
/// missing required entries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid prebuilt layout in {dir}: missing {missing}")]
pub struct PrebuiltLayoutError {
    /// The prebuilt directory that was validated.
    pub dir: PathBuf,
    /// Description of the missing entry (file name or pattern).
    pub missing: String,
}

impl PrebuiltLayoutError {
    /// Creates a new prebuilt layout error.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, missing: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            missing: missing.into(),
        }
    }
}

/// The kind of failure an external processor invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorErrorKind {
    /// The external tool exited with a non-zero status.
    NonZeroExit(Option<i32>),
    /// The invocation exceeded its wall-clock limit.
    Timeout(Duration),
    /// A declared output file was not produced.
    MissingOutput(PathBuf),
    /// A declared output file was produced but is empty.
    EmptyOutput(PathBuf),
    /// The external tool could not be spawned.
    Spawn(String),
    /// The input record was rejected before the tool ran.
    InvalidInput(String),
    /// The tool ran but its output could not be interpreted.
    OutputParse(String),
}

impl std::fmt::Display for ProcessorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonZeroExit(Some(code)) => write!(f, "exited with status {code}"),
            Self::NonZeroExit(None) => write!(f, "terminated by signal"),
            Self::Timeout(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            Self::MissingOutput(path) => write!(f, "expected output missing: {}", path.display()),
            Self::EmptyOutput(path) => write!(f, "expected output empty: {}", path.display()),
            Self::Spawn(msg) => write!(f, "failed to spawn: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::OutputParse(msg) => write!(f, "unreadable tool output: {msg}"),
        }
    }
}

/// Error raised by an external processor adapter for a single work item.
///
/// Always recovered at the stage-runner boundary: the item is marked failed
/// with this error's message and sibling items are unaffected.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{tool}: {kind}{}", .stderr_excerpt.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ProcessorError {
    /// Name of the tool or adapter that failed.
    pub tool: String,
    /// What went wrong.
    pub kind: ProcessorErrorKind,
    /// Tail of the tool's stderr, capped at [`STDERR_EXCERPT_LIMIT`] bytes.
    pub stderr_excerpt: Option<String>,
}

impl ProcessorError {
    /// Creates a new processor error with no stderr excerpt.
    #[must_use]
    pub fn new(tool: impl Into<String>, kind: ProcessorErrorKind) -> Self {
        Self {
            tool: tool.into(),
            kind,
            stderr_excerpt: None,
        }
    }

    /// Attaches a stderr excerpt, truncated to [`STDERR_EXCERPT_LIMIT`].
    #[must_use]
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        if !trimmed.is_empty() {
            self.stderr_excerpt = Some(truncate_excerpt(trimmed));
        }
        self
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(tool: impl Into<String>, limit: Duration) -> Self {
        Self::new(tool, ProcessorErrorKind::Timeout(limit))
    }

    /// Creates a non-zero-exit error.
    #[must_use]
    pub fn non_zero_exit(tool: impl Into<String>, code: Option<i32>) -> Self {
        Self::new(tool, ProcessorErrorKind::NonZeroExit(code))
    }

    /// Creates a missing-output error.
    #[must_use]
    pub fn missing_output(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(tool, ProcessorErrorKind::MissingOutput(path.into()))
    }

    /// Creates an empty-output error.
    #[must_use]
    pub fn empty_output(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(tool, ProcessorErrorKind::EmptyOutput(path.into()))
    }

    /// Creates a spawn-failure error.
    #[must_use]
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ProcessorErrorKind::Spawn(message.into()))
    }

    /// Creates an invalid-input error.
    #[must_use]
    pub fn invalid_input(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ProcessorErrorKind::InvalidInput(message.into()))
    }

    /// Creates an output-parse error.
    #[must_use]
    pub fn output_parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ProcessorErrorKind::OutputParse(message.into()))
    }

    /// Returns true if the failure was a wall-clock timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ProcessorErrorKind::Timeout(_))
    }
}

fn truncate_excerpt(s: &str) -> String {
    if s.len() <= STDERR_EXCERPT_LIMIT {
        return s.to_string();
    }
    // Keep the tail: tools print the interesting diagnostic last.
    let start = s.len() - STDERR_EXCERPT_LIMIT;
    let mut start = start;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &s[start..])
}
