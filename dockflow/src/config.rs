//! Run configuration and validation.
//!
//! All run-level knobs live in one struct, validated once before the
//! coordinator constructs the pipeline graph - a misconfigured run must
//! fail before any adapter is invoked.

use crate::errors::ConfigurationError;
use crate::manifest::MalformedLinePolicy;
use crate::stage::DEFAULT_ITEM_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Pipeline shape selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Full chain: structure fix, receptor prep, and pocket prediction run
    /// before docking.
    Custom,
    /// Receptor preparation is skipped; a prebuilt receptor directory is
    /// consumed directly as docking input.
    Prebuilt,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom => f.write_str("custom"),
            Self::Prebuilt => f.write_str("prebuilt"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(Self::Custom),
            "prebuilt" => Ok(Self::Prebuilt),
            other => Err(format!("unknown mode {other:?}: expected custom or prebuilt")),
        }
    }
}

/// The docking engine to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockTool {
    /// AutoDock Vina.
    Vina,
    /// idock (the source pipeline's default engine).
    #[default]
    Idock,
}

impl fmt::Display for DockTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vina => f.write_str("vina"),
            Self::Idock => f.write_str("idock"),
        }
    }
}

impl FromStr for DockTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vina" => Ok(Self::Vina),
            "idock" => Ok(Self::Idock),
            other => Err(format!("unknown dock tool {other:?}: expected vina or idock")),
        }
    }
}

/// Docking search-box dimensions in Angstroms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDims {
    /// Box size along X.
    pub x: f64,
    /// Box size along Y.
    pub y: f64,
    /// Box size along Z.
    pub z: f64,
}

impl BoxDims {
    /// Creates box dimensions.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Validates that every dimension is positive and finite.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (axis, value) in [('x', self.x), ('y', self.y), ('z', self.z)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::InvalidBoxDimension { axis, value });
            }
        }
        Ok(())
    }
}

/// External tool program names, resolved via `PATH` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// OpenBabel converter for SMILES embedding.
    pub obabel: String,
    /// ADFR ligand preparation tool.
    pub prepare_ligand: String,
    /// Structure repair tool.
    pub pdbfixer: String,
    /// ADFR receptor preparation tool.
    pub prepare_receptor: String,
    /// P2Rank pocket predictor.
    pub prank: String,
    /// AutoDock Vina binary.
    pub vina: String,
    /// idock binary.
    pub idock: String,
    /// Rescoring command prefix (program plus leading arguments).
    pub rescorer: Vec<String>,
    /// Model file passed to the rescorer, if it needs one.
    pub rescorer_model: Option<PathBuf>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            obabel: "obabel".to_string(),
            prepare_ligand: "prepare_ligand".to_string(),
            pdbfixer: "pdbfixer".to_string(),
            prepare_receptor: "prepare_receptor".to_string(),
            prank: "prank".to_string(),
            vina: "vina".to_string(),
            idock: "idock".to_string(),
            rescorer: vec!["sfct-score".to_string()],
            rescorer_model: None,
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The ligand manifest file (`<identifier> <SMILES>` per line).
    pub ligand_manifest: PathBuf,
    /// Protein source: a directory of `.pdb` files (custom mode) or a
    /// prebuilt receptor directory (prebuilt mode).
    pub protein_source: PathBuf,
    /// Pipeline shape.
    pub mode: RunMode,
    /// Docking search-box dimensions.
    pub box_dims: BoxDims,
    /// Worker-pool size per stage; `None` autodetects from available
    /// parallelism.
    pub worker_count: Option<usize>,
    /// The docking engine.
    pub dock_tool: DockTool,
    /// Root of the run's output tree.
    pub output_root: PathBuf,
    /// Skip items whose outputs already exist.
    pub resume: bool,
    /// Wall-clock limit per adapter invocation.
    pub item_timeout: Duration,
    /// What to do with malformed manifest lines.
    pub malformed_line: MalformedLinePolicy,
    /// External tool locations.
    pub tools: ToolPaths,
}

impl RunConfig {
    /// Creates a config with defaults for everything optional.
    #[must_use]
    pub fn new(
        ligand_manifest: impl Into<PathBuf>,
        protein_source: impl Into<PathBuf>,
        mode: RunMode,
        box_dims: BoxDims,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ligand_manifest: ligand_manifest.into(),
            protein_source: protein_source.into(),
            mode,
            box_dims,
            worker_count: None,
            dock_tool: DockTool::default(),
            output_root: output_root.into(),
            resume: false,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            malformed_line: MalformedLinePolicy::default(),
            tools: ToolPaths::default(),
        }
    }

    /// Validates every run-level precondition.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.ligand_manifest.is_file() {
            return Err(ConfigurationError::missing_path(
                "ligand manifest",
                &self.ligand_manifest,
            ));
        }
        if !self.protein_source.is_dir() {
            return Err(ConfigurationError::missing_path(
                "protein source",
                &self.protein_source,
            ));
        }
        if let Some(count) = self.worker_count {
            if count == 0 {
                return Err(ConfigurationError::InvalidWorkerCount(count));
            }
        }
        self.box_dims.validate()?;
        if self.item_timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout);
        }
        Ok(())
    }

    /// The worker count to use: the configured value, or the autodetected
    /// default.
    #[must_use]
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(default_worker_count)
    }
}

/// Autodetected worker count: available parallelism minus two, at least one.
///
/// Leaves headroom for the coordinator and the external tools' own threads,
/// matching the source pipeline's `cpu_count - 2` convention.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_sub(2)
        .max(1)
}
