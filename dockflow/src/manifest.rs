//! Run-input parsing: the ligand manifest and structure-file scans.
//!
//! The ligand manifest is line-oriented, one `<identifier> <SMILES>` record
//! per line. Blank lines and `#` comments are ignored. The malformed-line
//! policy is declared up front rather than silent: the default skips the
//! line with a warning (matching the source pipeline, which dropped short
//! lines), the strict policy fails the run.

use crate::errors::{ConfigurationError, ManifestError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What to do with a manifest line that is not `<identifier> <payload>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Skip the line and emit a `tracing` warning.
    #[default]
    Warn,
    /// Fail the whole parse with [`ManifestError::MalformedLine`].
    Fail,
}

/// One ligand record from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigandRecord {
    /// Stable work-item identifier (the manifest's first column).
    pub id: String,
    /// The SMILES string handed opaquely to the ligand-prep adapter.
    pub smiles: String,
}

/// The parsed, read-only input manifest.
#[derive(Debug, Clone, Default)]
pub struct RunManifest {
    /// Ligand records in file order.
    pub records: Vec<LigandRecord>,
}

impl RunManifest {
    /// Parses manifest text under the given malformed-line policy.
    pub fn parse_str(input: &str, policy: MalformedLinePolicy) -> Result<Self, ManifestError> {
        let mut records = Vec::new();
        for (idx, raw) in input.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(id), Some(smiles)) => records.push(LigandRecord {
                    id: id.to_string(),
                    smiles: smiles.to_string(),
                }),
                _ => match policy {
                    MalformedLinePolicy::Warn => {
                        warn!(line_no = idx + 1, content = %line, "skipping malformed manifest line");
                    }
                    MalformedLinePolicy::Fail => {
                        return Err(ManifestError::MalformedLine {
                            line_no: idx + 1,
                            content: line.to_string(),
                        });
                    }
                },
            }
        }
        Ok(Self { records })
    }

    /// Reads and parses a manifest file.
    ///
    /// An unreadable file is a configuration error; a manifest that parses
    /// to zero records is a [`ManifestError::Empty`].
    pub fn from_file(
        path: &Path,
        policy: MalformedLinePolicy,
    ) -> Result<Self, crate::errors::DockflowError> {
        let text = fs::read_to_string(path)
            .map_err(|_| ConfigurationError::missing_path("ligand manifest", path))?;
        let manifest = Self::parse_str(&text, policy)?;
        if manifest.records.is_empty() {
            return Err(ManifestError::Empty {
                path: path.to_path_buf(),
            }
            .into());
        }
        Ok(manifest)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the manifest holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Scans a directory for structure files with the given extension, sorted by
/// file name for deterministic item ordering.
pub fn scan_structure_dir(
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, ConfigurationError> {
    if !dir.is_dir() {
        return Err(ConfigurationError::missing_path("protein source", dir));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|_| ConfigurationError::missing_path("protein source", dir))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(ConfigurationError::EmptyInputSet {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(files)
}

/// Derives a work-item key from a structure file name.
///
/// Strips the structure-fix stage's `out-` prefix so the key stays stable
/// across the protein chain (the source pipeline did the same rename when
/// matching receptors to box centers).
#[must_use]
pub fn structure_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_prefix("out-").unwrap_or(&stem).to_string()
}
