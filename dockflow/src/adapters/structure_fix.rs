//! Protein structure repair via an external fixer.

use crate::config::ToolPaths;
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Adapter invoking `pdbfixer` over each raw PDB.
///
/// Output names carry the fixer's `out-` prefix; downstream stages strip it
/// when deriving keys so one receptor keeps one identity across the chain.
#[derive(Debug, Clone)]
pub struct StructureFixAdapter {
    pdbfixer: String,
}

impl StructureFixAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            pdbfixer: tools.pdbfixer.clone(),
        }
    }
}

#[async_trait]
impl ProcessorAdapter for StructureFixAdapter {
    fn name(&self) -> &str {
        "structure_fix"
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("out-{key}.pdb"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let input = request
            .inputs
            .first()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "no structure file"))?;
        let output = request.output_dir.join(format!("out-{}.pdb", request.key));

        let spec = CommandSpec::new(
            &self.pdbfixer,
            [
                input.display().to_string(),
                format!("--output={}", output.display()),
                "--add-atoms=all".to_string(),
                "--keep-heterogens=none".to_string(),
                "--replace-nonstandard".to_string(),
                "--add-residues".to_string(),
                "--ph=7.0".to_string(),
            ],
        );
        run_tool(self.name(), &spec).await?;

        Ok(ProcessOutcome::with_outputs([output]))
    }
}
