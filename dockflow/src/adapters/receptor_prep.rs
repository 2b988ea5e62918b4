//! Receptor preparation: fixed PDB to docking-ready PDBQT.

use crate::config::ToolPaths;
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Adapter invoking `prepare_receptor` over each fixed structure.
#[derive(Debug, Clone)]
pub struct ReceptorPrepAdapter {
    prepare_receptor: String,
}

impl ReceptorPrepAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            prepare_receptor: tools.prepare_receptor.clone(),
        }
    }
}

#[async_trait]
impl ProcessorAdapter for ReceptorPrepAdapter {
    fn name(&self) -> &str {
        "receptor_prep"
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("{key}.pdbqt"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let input = request
            .inputs
            .first()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "no fixed structure"))?;
        let output = request.output_dir.join(format!("{}.pdbqt", request.key));

        let spec = CommandSpec::new(
            &self.prepare_receptor,
            [
                "-r".to_string(),
                input.display().to_string(),
                "-o".to_string(),
                output.display().to_string(),
            ],
        );
        run_tool(self.name(), &spec).await?;

        Ok(ProcessOutcome::with_outputs([output]))
    }
}
