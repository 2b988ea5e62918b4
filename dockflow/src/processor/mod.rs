//! The external-processor adapter contract.
//!
//! Every chemistry tool the pipeline touches - converters, fixers, pocket
//! predictors, docking engines, rescorers - is consumed through this one
//! contract: paths in, paths out, or a typed [`ProcessorError`]. Adapters
//! are stateless and safe to invoke concurrently because every output file
//! name derives from the work-item key; no two invocations share a file.

mod command;

pub use command::{run_tool, CommandSpec, ToolOutput};

use crate::errors::ProcessorError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// One adapter invocation's input.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// The work-item key; all output names derive from it.
    pub key: String,
    /// Input artifact paths (committed by the upstream stage, or the item's
    /// initial artifacts for an entry stage).
    pub inputs: Vec<PathBuf>,
    /// The stage's output directory. The adapter writes here and nowhere
    /// else, and must not mutate `inputs`.
    pub output_dir: PathBuf,
    /// Opaque payload for manifest-born items (a SMILES string).
    pub payload: Option<String>,
}

/// One adapter invocation's successful result.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Artifacts produced, to be committed for the downstream stage.
    pub outputs: Vec<PathBuf>,
    /// Optional structured results (scores) surfaced into the final report.
    pub data: HashMap<String, serde_json::Value>,
}

impl ProcessOutcome {
    /// An outcome carrying only artifacts.
    #[must_use]
    pub fn with_outputs(outputs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            outputs: outputs.into_iter().collect(),
            data: HashMap::new(),
        }
    }

    /// Attaches one data entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Uniform wrapper around one external tool or model.
///
/// Implementations must confine side effects to `request.output_dir`, derive
/// every file name from `request.key`, and hold no mutable state across
/// invocations - the stage runner calls `process` from many workers at once.
#[async_trait]
pub trait ProcessorAdapter: Send + Sync + Debug {
    /// The adapter's name, used in error messages and logs.
    fn name(&self) -> &str;

    /// The artifacts a successful invocation for `key` commits.
    ///
    /// Used by the stage runner for resume detection (all present and
    /// non-empty means the adapter is not re-invoked) and for discarding
    /// partial files after a failure.
    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf>;

    /// Runs the external processor for one work item.
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError>;
}

/// Verifies that every declared output exists and is non-empty.
///
/// Converts "silently wrong output" into a detectable failure: a tool that
/// exits zero but writes nothing is still a per-item error.
pub fn verify_outputs(tool: &str, outputs: &[PathBuf]) -> Result<(), ProcessorError> {
    for path in outputs {
        match std::fs::metadata(path) {
            Err(_) => return Err(ProcessorError::missing_output(tool, path.clone())),
            Ok(meta) if meta.len() == 0 => {
                return Err(ProcessorError::empty_output(tool, path.clone()))
            }
            Ok(_) => {}
        }
    }
    Ok(())
}

/// Returns true if every path exists and is non-empty.
#[must_use]
pub fn outputs_present(outputs: &[PathBuf]) -> bool {
    !outputs.is_empty()
        && outputs
            .iter()
            .all(|path| std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProcessorErrorKind;

    #[test]
    fn test_verify_outputs_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ligand_L1.pdbqt");
        std::fs::write(&path, "ATOM").unwrap();
        assert!(verify_outputs("obabel", &[path]).is_ok());
    }

    #[test]
    fn test_verify_outputs_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never_written.pdbqt");
        let err = verify_outputs("obabel", &[path.clone()]).unwrap_err();
        assert_eq!(err.kind, ProcessorErrorKind::MissingOutput(path));
    }

    #[test]
    fn test_verify_outputs_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdbqt");
        std::fs::write(&path, "").unwrap();
        let err = verify_outputs("obabel", &[path.clone()]).unwrap_err();
        assert_eq!(err.kind, ProcessorErrorKind::EmptyOutput(path));
    }

    #[test]
    fn test_outputs_present_requires_nonempty_set() {
        assert!(!outputs_present(&[]));
    }
}
