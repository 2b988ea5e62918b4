//! Stage identifiers and immutable stage descriptors.

use crate::processor::ProcessorAdapter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default wall-clock limit for one adapter invocation.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(600);

/// Identifies one step of the docking pipeline.
///
/// The variants double as the stable output-subdirectory vocabulary; see
/// [`crate::layout`] for the directory each stage owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// SMILES to docking-ready ligand (3D embedding + PDBQT conversion).
    LigandPrep,
    /// Raw PDB structure repair.
    StructureFix,
    /// Fixed PDB to receptor PDBQT.
    ReceptorPrep,
    /// Binding-site prediction and box-center extraction.
    PocketPrediction,
    /// Receptor/ligand docking.
    Docking,
    /// Second-pass rescoring of docked poses.
    Rescoring,
}

impl StageId {
    /// Returns the stable snake_case name of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LigandPrep => "ligand_prep",
            Self::StructureFix => "structure_fix",
            Self::ReceptorPrep => "receptor_prep",
            Self::PocketPrediction => "pocket_prediction",
            Self::Docking => "docking",
            Self::Rescoring => "rescoring",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable descriptor for one pipeline stage.
///
/// Owned by the pipeline graph and never mutated after construction. The
/// stage runner reads it; work items never see it.
#[derive(Clone)]
pub struct StagePlan {
    /// The stage this plan executes.
    pub stage: StageId,
    /// The stage whose successes feed this one, or `None` for an entry
    /// stage fed directly from the manifest.
    pub depends_on: Option<StageId>,
    /// Declared input directories (informational; actual inputs travel as
    /// per-item artifact paths through the registry).
    pub input_dirs: Vec<PathBuf>,
    /// The directory this stage writes into.
    pub output_dir: PathBuf,
    /// The adapter invoked once per eligible work item.
    pub adapter: Arc<dyn ProcessorAdapter>,
    /// Bounded worker-pool size.
    pub worker_count: usize,
    /// Wall-clock limit per adapter invocation.
    pub item_timeout: Duration,
}

impl StagePlan {
    /// Creates a stage plan with the default timeout.
    #[must_use]
    pub fn new(
        stage: StageId,
        output_dir: impl Into<PathBuf>,
        adapter: Arc<dyn ProcessorAdapter>,
        worker_count: usize,
    ) -> Self {
        Self {
            stage,
            depends_on: None,
            input_dirs: Vec::new(),
            output_dir: output_dir.into(),
            adapter,
            worker_count,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    /// Declares the upstream stage whose successes feed this one.
    #[must_use]
    pub fn with_dependency(mut self, stage: StageId) -> Self {
        self.depends_on = Some(stage);
        self
    }

    /// Declares the input directories this stage reads.
    #[must_use]
    pub fn with_input_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.input_dirs = dirs.into_iter().collect();
        self
    }

    /// Overrides the per-item timeout.
    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }
}

impl fmt::Debug for StagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePlan")
            .field("stage", &self.stage)
            .field("depends_on", &self.depends_on)
            .field("output_dir", &self.output_dir)
            .field("adapter", &self.adapter.name())
            .field("worker_count", &self.worker_count)
            .field("item_timeout", &self.item_timeout)
            .finish()
    }
}
