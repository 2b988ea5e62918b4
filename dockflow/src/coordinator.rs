//! The run coordinator: one invocation of the full pipeline graph.
//!
//! Builds the stage sequence for the selected mode, drives the stage runner
//! over it, joins the receptor and ligand chains at docking, and aggregates
//! every stage report into the final run summary. This is the only component
//! that decides run-level success, and the only place stage plans are
//! constructed - nothing downstream re-wires directories.

use crate::adapters::{
    merge_center_files, parse_center_file, BoxCenter, DockingAdapter, LigandPrepAdapter,
    PocketAdapter, ReceptorPrepAdapter, RescoringAdapter, StructureFixAdapter,
};
use crate::cancellation::CancellationToken;
use crate::config::{RunConfig, RunMode};
use crate::errors::{DockflowError, PrebuiltLayoutError};
use crate::layout::{validate_prebuilt, RunLayout, CENTER_FILE_NAME};
use crate::manifest::{scan_structure_dir, structure_key, RunManifest};
use crate::registry::{pair_key, Lineage, WorkItem, WorkItemRegistry};
use crate::report::{ItemRecord, RunOutcome, RunSummary, StageReport};
use crate::runner::StageRunner;
use crate::stage::{StageId, StagePlan};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Stage order of the ligand chain.
const LIGAND_CHAIN: [StageId; 1] = [StageId::LigandPrep];
/// Stage order of the receptor chain in custom mode.
const RECEPTOR_CHAIN: [StageId; 3] = [
    StageId::StructureFix,
    StageId::ReceptorPrep,
    StageId::PocketPrediction,
];
/// Stage order of the pair chain after the docking join.
const PAIR_CHAIN: [StageId; 2] = [StageId::Docking, StageId::Rescoring];

/// Drives one pipeline invocation end-to-end.
#[derive(Debug)]
pub struct RunCoordinator {
    config: RunConfig,
    layout: RunLayout,
    cancel: CancellationToken,
}

/// A receptor ready for the docking join.
struct ReadyReceptor {
    key: String,
    pdbqt: PathBuf,
}

impl RunCoordinator {
    /// Creates a coordinator for `config`.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let layout = RunLayout::new(&config.output_root);
        Self {
            config,
            layout,
            cancel: CancellationToken::new(),
        }
    }

    /// The run's cancellation token; trip it to stop dispatching new work.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The run's output layout.
    #[must_use]
    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Runs the pipeline and writes the report artifact.
    ///
    /// Configuration-class failures (invalid config, bad prebuilt layout,
    /// unreadable manifest) surface as errors before any stage runs. Once
    /// stages start, per-item failures only shape the summary - the
    /// returned `RunSummary` reports partial and total failure instead of
    /// erroring.
    pub async fn run(&self) -> Result<RunSummary, DockflowError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        self.config.validate()?;
        if self.config.mode == RunMode::Prebuilt {
            validate_prebuilt(&self.config.protein_source)?;
        }
        self.layout.ensure_root()?;

        let workers = self.config.effective_worker_count();
        info!(
            %run_id,
            mode = %self.config.mode,
            dock_tool = %self.config.dock_tool,
            workers,
            root = %self.layout.root().display(),
            "run started"
        );

        let runner = StageRunner::new()
            .with_resume(self.config.resume)
            .with_cancellation(self.cancel.clone());
        let mut stage_reports: Vec<StageReport> = Vec::new();

        // Ligand chain.
        let manifest =
            RunManifest::from_file(&self.config.ligand_manifest, self.config.malformed_line)?;
        let ligands = Arc::new(WorkItemRegistry::new());
        for record in &manifest.records {
            ligands.register(WorkItem::ligand(&record.id, &record.smiles))?;
        }
        let ligand_plan = self.plan(
            StageId::LigandPrep,
            None,
            vec![self.config.ligand_manifest.clone()],
            self.layout.ligand_pdbqt(),
            Arc::new(LigandPrepAdapter::new(
                &self.config.tools,
                self.layout.ligand_mol2(),
            )),
            workers,
        );
        stage_reports.push(runner.execute(&ligand_plan, &ligands).await?);

        // Receptor chain.
        let receptors = Arc::new(WorkItemRegistry::new());
        let (ready_receptors, centers) = match self.config.mode {
            RunMode::Custom => {
                self.run_receptor_chain(&runner, &receptors, workers, &mut stage_reports)
                    .await?
            }
            RunMode::Prebuilt => self.load_prebuilt_receptors(&receptors)?,
        };

        // Docking join: each receptor against every prepared ligand. The
        // pairing is deliberately receptor-by-ligand-set, not an arbitrary
        // cross-product policy - reverse docking screens a small ligand set
        // against many receptors.
        let ready_ligands: Vec<(String, PathBuf)> = ligands
            .snapshot()
            .iter()
            .filter(|item| item.outcome(StageId::LigandPrep).is_succeeded())
            .filter_map(|item| {
                item.artifacts(StageId::LigandPrep)
                    .first()
                    .map(|path| (item.key().to_string(), path.clone()))
            })
            .collect();

        let pairs = Arc::new(WorkItemRegistry::new());
        let mut receptor_paths: HashMap<String, PathBuf> = HashMap::new();
        for receptor in &ready_receptors {
            receptor_paths.insert(receptor.key.clone(), receptor.pdbqt.clone());
            for (ligand_key, ligand_pdbqt) in &ready_ligands {
                pairs.register(WorkItem::pair(
                    pair_key(&receptor.key, ligand_key),
                    Lineage {
                        receptor: receptor.key.clone(),
                        ligand: ligand_key.clone(),
                    },
                    vec![receptor.pdbqt.clone(), ligand_pdbqt.clone()],
                ))?;
            }
        }
        if pairs.is_empty() {
            warn!("docking join produced no receptor/ligand pairs");
        }

        let dock_plan = self.plan(
            StageId::Docking,
            None,
            vec![self.layout.ligand_pdbqt(), self.receptor_dir()],
            self.layout.docking(),
            Arc::new(DockingAdapter::new(
                self.config.dock_tool,
                &self.config.tools,
                self.config.box_dims,
                centers,
            )),
            workers,
        );
        stage_reports.push(runner.execute(&dock_plan, &pairs).await?);

        let rescore_plan = self.plan(
            StageId::Rescoring,
            Some(StageId::Docking),
            vec![self.layout.docking()],
            self.layout.rescoring(),
            Arc::new(RescoringAdapter::new(
                &self.config.tools,
                self.config.dock_tool,
                receptor_paths,
            )),
            workers,
        );
        stage_reports.push(runner.execute(&rescore_plan, &pairs).await?);

        // Final records: ligands, receptors, then pairs; the pipeline
        // terminal is rescoring, so only pairs can reach it.
        let terminal = StageId::Rescoring;
        let receptor_chain: &[StageId] = match self.config.mode {
            RunMode::Custom => &RECEPTOR_CHAIN,
            RunMode::Prebuilt => &[],
        };
        let mut items: Vec<ItemRecord> = Vec::new();
        for item in ligands.snapshot() {
            items.push(ItemRecord::from_item(&item, &LIGAND_CHAIN, terminal));
        }
        for item in receptors.snapshot() {
            items.push(ItemRecord::from_item(&item, receptor_chain, terminal));
        }
        for item in pairs.snapshot() {
            items.push(ItemRecord::from_item(&item, &PAIR_CHAIN, terminal));
        }

        let outcome = RunOutcome::evaluate(&items);
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stage_reports,
            items,
            outcome,
            cancelled: self.cancel.reason(),
        };
        summary.write(&self.layout.report_file())?;
        info!(%run_id, outcome = ?outcome, report = %self.layout.report_file().display(), "run finished");
        Ok(summary)
    }

    /// Runs structure fix, receptor prep, and pocket prediction, then
    /// merges the per-receptor centers into the shared index.
    async fn run_receptor_chain(
        &self,
        runner: &StageRunner,
        receptors: &Arc<WorkItemRegistry>,
        workers: usize,
        stage_reports: &mut Vec<StageReport>,
    ) -> Result<(Vec<ReadyReceptor>, Vec<(String, BoxCenter)>), DockflowError> {
        let structures = scan_structure_dir(&self.config.protein_source, "pdb")?;
        for path in &structures {
            receptors.register(WorkItem::receptor(structure_key(path), path))?;
        }

        let fix_plan = self.plan(
            StageId::StructureFix,
            None,
            vec![self.config.protein_source.clone()],
            self.layout.protein_fixed(),
            Arc::new(StructureFixAdapter::new(&self.config.tools)),
            workers,
        );
        stage_reports.push(runner.execute(&fix_plan, receptors).await?);

        let prep_plan = self.plan(
            StageId::ReceptorPrep,
            Some(StageId::StructureFix),
            vec![self.layout.protein_fixed()],
            self.layout.protein_pdbqt(),
            Arc::new(ReceptorPrepAdapter::new(&self.config.tools)),
            workers,
        );
        stage_reports.push(runner.execute(&prep_plan, receptors).await?);

        let pocket_plan = self.plan(
            StageId::PocketPrediction,
            Some(StageId::StructureFix),
            vec![self.layout.protein_fixed()],
            self.layout.pocket(),
            Arc::new(PocketAdapter::new(&self.config.tools)),
            workers,
        );
        stage_reports.push(runner.execute(&pocket_plan, receptors).await?);

        merge_center_files(&self.layout.pocket(), &self.layout.center_file())?;
        let centers = parse_center_file(&self.layout.center_file())?;

        // A receptor joins docking only with both a prepared PDBQT and a
        // predicted pocket center committed.
        let mut ready = Vec::new();
        for item in receptors.snapshot() {
            if item.outcome(StageId::ReceptorPrep).is_succeeded()
                && item.outcome(StageId::PocketPrediction).is_succeeded()
            {
                if let Some(pdbqt) = item.artifacts(StageId::ReceptorPrep).first() {
                    ready.push(ReadyReceptor {
                        key: item.key().to_string(),
                        pdbqt: pdbqt.clone(),
                    });
                }
            }
        }
        Ok((ready, centers))
    }

    /// Registers receptors from a validated prebuilt directory; they enter
    /// the docking join directly.
    fn load_prebuilt_receptors(
        &self,
        receptors: &Arc<WorkItemRegistry>,
    ) -> Result<(Vec<ReadyReceptor>, Vec<(String, BoxCenter)>), DockflowError> {
        let files = scan_structure_dir(&self.config.protein_source, "pdbqt")?;
        let mut ready = Vec::new();
        for path in &files {
            let key = structure_key(path);
            receptors.register(WorkItem::receptor(&key, path))?;
            ready.push(ReadyReceptor {
                key,
                pdbqt: path.clone(),
            });
        }

        let center_file = std::fs::read_dir(&self.config.protein_source)?
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().ends_with(CENTER_FILE_NAME))
            })
            .ok_or_else(|| {
                PrebuiltLayoutError::new(&self.config.protein_source, CENTER_FILE_NAME)
            })?;
        let centers = parse_center_file(&center_file)?;
        Ok((ready, centers))
    }

    fn receptor_dir(&self) -> PathBuf {
        match self.config.mode {
            RunMode::Custom => self.layout.protein_pdbqt(),
            RunMode::Prebuilt => self.config.protein_source.clone(),
        }
    }

    fn plan(
        &self,
        stage: StageId,
        depends_on: Option<StageId>,
        input_dirs: Vec<PathBuf>,
        output_dir: PathBuf,
        adapter: Arc<dyn crate::processor::ProcessorAdapter>,
        workers: usize,
    ) -> StagePlan {
        let mut plan = StagePlan::new(stage, output_dir, adapter, workers)
            .with_input_dirs(input_dirs)
            .with_item_timeout(self.config.item_timeout);
        plan.depends_on = depends_on;
        plan
    }
}
