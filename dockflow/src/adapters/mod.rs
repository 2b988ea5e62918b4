//! Concrete processor adapters for the external chemistry tools.
//!
//! Each adapter wraps exactly one tool behind the
//! [`ProcessorAdapter`](crate::processor::ProcessorAdapter) contract; none
//! of them computes chemistry in-process. File parsing (pocket CSVs, pose
//! remarks, score tables) stays here because it is plumbing for the tools'
//! own output formats, not scoring logic.

mod centers;
mod docking;
mod ligand_prep;
mod pocket;
mod receptor_prep;
mod rescoring;
mod structure_fix;

pub use centers::{lookup_center, merge_center_files, parse_center_file, BoxCenter};
pub use docking::DockingAdapter;
pub use ligand_prep::LigandPrepAdapter;
pub use pocket::PocketAdapter;
pub use receptor_prep::ReceptorPrepAdapter;
pub use rescoring::RescoringAdapter;
pub use structure_fix::StructureFixAdapter;
