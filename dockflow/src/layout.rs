//! Output-tree layout for one pipeline run.
//!
//! Every stage reads and writes fixed, documented subdirectories under a
//! single run root, so stages compose without wiring code and a rerun finds
//! its artifacts in the same place. The names below are the stable contract;
//! nothing else in the crate spells out a stage path literal.

use crate::errors::PrebuiltLayoutError;
use std::fs;
use std::path::{Path, PathBuf};

/// Intermediate MOL2 ligands.
pub const LIGAND_MOL2_DIR: &str = "ligand_mol2";
/// Docking-ready ligand PDBQT files.
pub const LIGAND_PDBQT_DIR: &str = "ligand_pdbqt";
/// Structure-fixed protein PDB files.
pub const PROTEIN_FIXED_DIR: &str = "protein_fixed";
/// Docking-ready receptor PDBQT files.
pub const PROTEIN_PDBQT_DIR: &str = "protein_pdbqt";
/// Predicted pocket structures and per-receptor box centers.
pub const POCKET_DIR: &str = "pocket";
/// Docked poses and per-pair engine logs.
pub const DOCKING_DIR: &str = "docking";
/// Rescoring tables.
pub const RESCORING_DIR: &str = "rescoring";
/// Merged box-center index consumed by the docking stage.
pub const CENTER_FILE_NAME: &str = "docking-center.txt";
/// Final machine-readable run report.
pub const REPORT_FILE_NAME: &str = "report.json";

/// Resolves the subdirectory each stage owns under one run root.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Creates a layout rooted at `root`. No directories are created yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The run root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Intermediate MOL2 ligand directory.
    #[must_use]
    pub fn ligand_mol2(&self) -> PathBuf {
        self.root.join(LIGAND_MOL2_DIR)
    }

    /// Docking-ready ligand directory.
    #[must_use]
    pub fn ligand_pdbqt(&self) -> PathBuf {
        self.root.join(LIGAND_PDBQT_DIR)
    }

    /// Structure-fixed protein directory.
    #[must_use]
    pub fn protein_fixed(&self) -> PathBuf {
        self.root.join(PROTEIN_FIXED_DIR)
    }

    /// Docking-ready receptor directory.
    #[must_use]
    pub fn protein_pdbqt(&self) -> PathBuf {
        self.root.join(PROTEIN_PDBQT_DIR)
    }

    /// Pocket-prediction output directory.
    #[must_use]
    pub fn pocket(&self) -> PathBuf {
        self.root.join(POCKET_DIR)
    }

    /// Docking output directory.
    #[must_use]
    pub fn docking(&self) -> PathBuf {
        self.root.join(DOCKING_DIR)
    }

    /// Rescoring output directory.
    #[must_use]
    pub fn rescoring(&self) -> PathBuf {
        self.root.join(RESCORING_DIR)
    }

    /// The merged box-center index inside the pocket directory.
    #[must_use]
    pub fn center_file(&self) -> PathBuf {
        self.pocket().join(CENTER_FILE_NAME)
    }

    /// The final report artifact path.
    #[must_use]
    pub fn report_file(&self) -> PathBuf {
        self.root.join(REPORT_FILE_NAME)
    }

    /// Creates the run root. Stage subdirectories are created by the stage
    /// runner as each stage starts, keeping a cancelled run's tree minimal.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }
}

/// Validates a prebuilt receptor directory before any stage runs.
///
/// A usable prebuilt set holds at least one receptor `.pdbqt` and a
/// `docking-center.txt` box-center index (the same entries the custom chain
/// would have produced).
pub fn validate_prebuilt(dir: &Path) -> Result<(), PrebuiltLayoutError> {
    if !dir.is_dir() {
        return Err(PrebuiltLayoutError::new(dir, "directory itself"));
    }

    let mut has_receptor = false;
    let mut has_center = false;
    for entry in fs::read_dir(dir)
        .map_err(|_| PrebuiltLayoutError::new(dir, "directory itself"))?
        .flatten()
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "pdbqt") {
            has_receptor = true;
        }
        if path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(CENTER_FILE_NAME))
        {
            has_center = true;
        }
    }

    if !has_receptor {
        return Err(PrebuiltLayoutError::new(dir, "receptor *.pdbqt files"));
    }
    if !has_center {
        return Err(PrebuiltLayoutError::new(dir, CENTER_FILE_NAME));
    }
    Ok(())
}
