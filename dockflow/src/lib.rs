//! # Dockflow
//!
//! Orchestration core for reverse-docking batch pipelines.
//!
//! Dockflow fans large collections of independent work items - ligands,
//! protein structures, receptor/ligand pairs - across bounded worker pools,
//! with support for:
//!
//! - **Stage-based execution**: a fixed chain of preparation, docking, and
//!   rescoring stages over directory-addressed artifacts
//! - **Failure isolation**: one bad ligand never stops the batch; failures
//!   are recorded per item and reported at the end
//! - **Resumable output trees**: reruns skip items whose artifacts already
//!   exist instead of re-invoking external tools
//! - **Black-box tooling**: every chemistry tool sits behind one
//!   file-in/file-out adapter contract
//! - **Cancellation handling**: an interrupt stops dispatch and leaves the
//!   registry consistent for a later resume
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dockflow::prelude::*;
//!
//! let config = RunConfig::new(
//!     "ligands.smi",
//!     "proteins/",
//!     RunMode::Custom,
//!     BoxDims::new(22.5, 22.5, 22.5),
//!     "runs/screen-01",
//! );
//!
//! let summary = RunCoordinator::new(config).run().await?;
//! std::process::exit(summary.outcome.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod layout;
pub mod manifest;
pub mod processor;
pub mod registry;
pub mod report;
pub mod runner;
pub mod stage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BoxDims, DockTool, RunConfig, RunMode, ToolPaths};
    pub use crate::coordinator::RunCoordinator;
    pub use crate::errors::{
        ConfigurationError, DockflowError, DuplicateKeyError, ManifestError,
        PrebuiltLayoutError, ProcessorError, ProcessorErrorKind,
    };
    pub use crate::layout::RunLayout;
    pub use crate::manifest::{MalformedLinePolicy, RunManifest};
    pub use crate::processor::{
        ProcessOutcome, ProcessRequest, ProcessorAdapter,
    };
    pub use crate::registry::{
        ItemKind, ItemOutcome, WorkItem, WorkItemRegistry,
    };
    pub use crate::report::{RunOutcome, RunSummary, StageReport};
    pub use crate::runner::StageRunner;
    pub use crate::stage::{StageId, StagePlan};
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
