//! Docking: one receptor/ligand pair per invocation.
//!
//! Vina and idock are interchangeable behind this adapter; both take the
//! receptor, the ligand, the receptor's predicted box center, and the run's
//! box dimensions. Pose files are keyed by the pair key, so concurrent
//! pairs never collide.

use super::centers::{lookup_center, BoxCenter};
use crate::config::{BoxDims, DockTool, ToolPaths};
use crate::errors::ProcessorError;
use crate::processor::{run_tool, CommandSpec, ProcessOutcome, ProcessRequest, ProcessorAdapter};
use crate::registry::split_pair_key;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Adapter invoking the configured docking engine per pair.
#[derive(Debug, Clone)]
pub struct DockingAdapter {
    engine: DockTool,
    program: String,
    box_dims: BoxDims,
    centers: Vec<(String, BoxCenter)>,
}

impl DockingAdapter {
    /// Creates the adapter with the resolved box-center index.
    #[must_use]
    pub fn new(
        engine: DockTool,
        tools: &ToolPaths,
        box_dims: BoxDims,
        centers: Vec<(String, BoxCenter)>,
    ) -> Self {
        let program = match engine {
            DockTool::Vina => tools.vina.clone(),
            DockTool::Idock => tools.idock.clone(),
        };
        Self {
            engine,
            program,
            box_dims,
            centers,
        }
    }
}

#[async_trait]
impl ProcessorAdapter for DockingAdapter {
    fn name(&self) -> &str {
        match self.engine {
            DockTool::Vina => "vina",
            DockTool::Idock => "idock",
        }
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("{key}.pdbqt"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        let (receptor_key, _) = split_pair_key(&request.key)
            .ok_or_else(|| ProcessorError::invalid_input(self.name(), "not a pair key"))?;
        let (Some(receptor), Some(ligand)) = (request.inputs.first(), request.inputs.get(1))
        else {
            return Err(ProcessorError::invalid_input(
                self.name(),
                "docking needs a receptor and a ligand",
            ));
        };
        let center = lookup_center(&self.centers, receptor_key).ok_or_else(|| {
            ProcessorError::invalid_input(
                self.name(),
                format!("no box center for receptor {receptor_key:?}"),
            )
        })?;

        let pose = request.output_dir.join(format!("{}.pdbqt", request.key));
        let spec = CommandSpec::new(
            &self.program,
            [
                "--receptor".to_string(),
                receptor.display().to_string(),
                "--ligand".to_string(),
                ligand.display().to_string(),
                "--center_x".to_string(),
                center.x.to_string(),
                "--center_y".to_string(),
                center.y.to_string(),
                "--center_z".to_string(),
                center.z.to_string(),
                "--size_x".to_string(),
                self.box_dims.x.to_string(),
                "--size_y".to_string(),
                self.box_dims.y.to_string(),
                "--size_z".to_string(),
                self.box_dims.z.to_string(),
                "--out".to_string(),
                pose.display().to_string(),
            ],
        );
        let output = run_tool(self.name(), &spec).await?;

        // Engines print their score table to stdout; keep it per pair.
        let log = request
            .output_dir
            .join(format!("{}_docking.log", request.key));
        let _ = std::fs::write(&log, output.stdout);

        Ok(ProcessOutcome::with_outputs([pose]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(engine: DockTool) -> DockingAdapter {
        DockingAdapter::new(
            engine,
            &ToolPaths::default(),
            BoxDims::new(20.0, 20.0, 20.0),
            vec![("1abc".to_string(), BoxCenter { x: 1.0, y: 2.0, z: 3.0 })],
        )
    }

    #[test]
    fn test_name_follows_engine() {
        assert_eq!(adapter(DockTool::Vina).name(), "vina");
        assert_eq!(adapter(DockTool::Idock).name(), "idock");
    }

    #[test]
    fn test_expected_outputs_keyed_by_pair() {
        let outputs = adapter(DockTool::Idock).expected_outputs("1abc__L1", Path::new("/run/docking"));
        assert_eq!(outputs, vec![PathBuf::from("/run/docking/1abc__L1.pdbqt")]);
    }

    #[tokio::test]
    async fn test_missing_center_is_per_item_failure() {
        let dir = tempfile::tempdir().unwrap();
        let request = ProcessRequest {
            key: "9zzz__L1".to_string(),
            inputs: vec![PathBuf::from("/r/9zzz.pdbqt"), PathBuf::from("/l/L1.pdbqt")],
            output_dir: dir.path().to_path_buf(),
            payload: None,
        };
        let err = adapter(DockTool::Idock).process(&request).await.unwrap_err();
        assert!(err.to_string().contains("no box center"));
    }
}
