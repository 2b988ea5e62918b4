//! Ligand preparation: SMILES to a docking-ready PDBQT.
//!
//! Two external steps behind one adapter, matching the source pipeline's
//! single ligand script: OpenBabel embeds the SMILES into a 3D MOL2 with
//! hydrogens, then `prepare_ligand` converts the MOL2 to PDBQT.

use crate::config::ToolPaths;
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Adapter invoking `obabel` and `prepare_ligand` per manifest record.
#[derive(Debug, Clone)]
pub struct LigandPrepAdapter {
    obabel: String,
    prepare_ligand: String,
    mol2_dir: PathBuf,
}

impl LigandPrepAdapter {
    /// Creates the adapter; intermediate MOL2 files land in `mol2_dir`.
    #[must_use]
    pub fn new(tools: &ToolPaths, mol2_dir: impl Into<PathBuf>) -> Self {
        Self {
            obabel: tools.obabel.clone(),
            prepare_ligand: tools.prepare_ligand.clone(),
            mol2_dir: mol2_dir.into(),
        }
    }

    fn mol2_path(&self, key: &str) -> PathBuf {
        self.mol2_dir.join(format!("ligand_{key}.mol2"))
    }
}

#[async_trait]
impl ProcessorAdapter for LigandPrepAdapter {
    fn name(&self) -> &str {
        "ligand_prep"
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("ligand_{key}.pdbqt"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let smiles = request
            .payload
            .as_deref()
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "no SMILES payload"))?;

        std::fs::create_dir_all(&self.mol2_dir)
            .map_err(|e| ProcessorError::spawn(self.name(), e.to_string()))?;
        let mol2 = self.mol2_path(&request.key);

        // SMILES -> 3D MOL2. obabel exits zero even when it converts
        // nothing, so the conversion count on stderr is the real signal.
        let embed = CommandSpec::new(
            &self.obabel,
            [
                format!("-:{smiles}"),
                "-omol2".to_string(),
                "-O".to_string(),
                mol2.display().to_string(),
                "--gen3d".to_string(),
                "-h".to_string(),
            ],
        );
        let output = run_tool(self.name(), &embed).await?;
        if output.stderr.contains("0 molecules converted") {
            return Err(
                ProcessorError::output_parse(self.name(), "SMILES conversion produced no molecule")
                    .with_stderr(&output.stderr),
            );
        }
        if !mol2.is_file() {
            return Err(ProcessorError::missing_output(self.name(), mol2));
        }

        // MOL2 -> PDBQT. prepare_ligand resolves its input relative to the
        // working directory, so run it from the MOL2 directory.
        let pdbqt = request.output_dir.join(format!("ligand_{}.pdbqt", request.key));
        let mol2_name = mol2
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let convert = CommandSpec::new(
            &self.prepare_ligand,
            [
                "-l".to_string(),
                mol2_name,
                "-o".to_string(),
                pdbqt.display().to_string(),
                "-A".to_string(),
                "hydrogens".to_string(),
            ],
        )
        .with_cwd(&self.mol2_dir);
        run_tool(self.name(), &convert).await?;

        Ok(ProcessOutcome::with_outputs([pdbqt]))
    }
}
