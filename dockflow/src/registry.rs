//! The work-item registry: canonical list of named inputs and their
//! per-stage progress.
//!
//! One registry exists per item family (ligands, receptors, docking pairs).
//! Items are stored in registration order - which is manifest order - behind
//! a hash index, so lookups are O(1) and reports stay reproducible no matter
//! in which order workers finish. History is append-only: a failure is
//! recorded against its stage and never erased, so the final report can name
//! every item's furthest-reached stage.

use crate::errors::DuplicateKeyError;
use crate::stage::{StageId, StagePlan};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What family of pipeline input an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A ligand from the input manifest.
    Ligand,
    /// A protein structure file.
    Receptor,
    /// A receptor/ligand pair materialized at the docking join.
    DockingPair,
}

/// Per-stage execution outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Not yet dispatched at this stage.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Completed; artifacts are valid for the next stage.
    Succeeded,
    /// Failed with a human-readable reason.
    Failed(String),
}

impl ItemOutcome {
    /// Returns true for [`ItemOutcome::Succeeded`].
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true for [`ItemOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Parent keys of a docking pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// The receptor-side parent key.
    pub receptor: String,
    /// The ligand-side parent key.
    pub ligand: String,
}

/// Separator between the receptor and ligand halves of a pair key.
pub const PAIR_KEY_SEPARATOR: &str = "__";

/// Builds the composite key for a receptor/ligand docking pair.
///
/// Receptor keys must not contain [`PAIR_KEY_SEPARATOR`]; they come from
/// file stems and manifest identifiers, which the pipeline treats as opaque
/// single tokens.
#[must_use]
pub fn pair_key(receptor: &str, ligand: &str) -> String {
    format!("{receptor}{PAIR_KEY_SEPARATOR}{ligand}")
}

/// Splits a pair key back into (receptor, ligand) halves.
#[must_use]
pub fn split_pair_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PAIR_KEY_SEPARATOR)
}

#[derive(Debug, Clone, Default)]
struct StageRecord {
    outcome: ItemOutcome,
    artifacts: Vec<PathBuf>,
    data: HashMap<String, serde_json::Value>,
    skipped: bool,
}

/// One unit of pipeline work, tracked through stages by a stable key.
#[derive(Debug, Clone)]
pub struct WorkItem {
    key: String,
    kind: ItemKind,
    payload: Option<String>,
    initial_artifacts: Vec<PathBuf>,
    lineage: Option<Lineage>,
    records: HashMap<StageId, StageRecord>,
}

impl WorkItem {
    /// Creates a ligand item carrying its SMILES payload.
    #[must_use]
    pub fn ligand(key: impl Into<String>, smiles: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ItemKind::Ligand,
            payload: Some(smiles.into()),
            initial_artifacts: Vec::new(),
            lineage: None,
            records: HashMap::new(),
        }
    }

    /// Creates a receptor item from a structure file.
    #[must_use]
    pub fn receptor(key: impl Into<String>, structure: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            kind: ItemKind::Receptor,
            payload: None,
            initial_artifacts: vec![structure.into()],
            lineage: None,
            records: HashMap::new(),
        }
    }

    /// Creates a docking-pair item joining a receptor and a ligand.
    ///
    /// `inputs` are the already-committed upstream artifacts (receptor
    /// PDBQT, ligand PDBQT) the docking adapter consumes.
    #[must_use]
    pub fn pair(
        key: impl Into<String>,
        lineage: Lineage,
        inputs: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        Self {
            key: key.into(),
            kind: ItemKind::DockingPair,
            payload: None,
            initial_artifacts: inputs.into_iter().collect(),
            lineage: Some(lineage),
            records: HashMap::new(),
        }
    }

    /// The stable item key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The item family.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// The opaque payload (SMILES for ligands).
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Parent keys, for docking pairs.
    #[must_use]
    pub fn lineage(&self) -> Option<&Lineage> {
        self.lineage.as_ref()
    }

    /// The outcome recorded for `stage` (Pending if never touched).
    #[must_use]
    pub fn outcome(&self, stage: StageId) -> ItemOutcome {
        self.records
            .get(&stage)
            .map(|r| r.outcome.clone())
            .unwrap_or_default()
    }

    /// Artifacts committed at `stage`.
    #[must_use]
    pub fn artifacts(&self, stage: StageId) -> &[PathBuf] {
        self.records
            .get(&stage)
            .map(|r| r.artifacts.as_slice())
            .unwrap_or_default()
    }

    /// Adapter-reported data committed at `stage` (e.g. scores).
    #[must_use]
    pub fn data(&self, stage: StageId) -> Option<&HashMap<String, serde_json::Value>> {
        self.records.get(&stage).map(|r| &r.data)
    }

    /// True if `stage` was satisfied from existing artifacts without
    /// invoking the adapter.
    #[must_use]
    pub fn was_skipped(&self, stage: StageId) -> bool {
        self.records.get(&stage).is_some_and(|r| r.skipped)
    }

    /// The last stage in `order` this item succeeded at.
    #[must_use]
    pub fn furthest_stage(&self, order: &[StageId]) -> Option<StageId> {
        order
            .iter()
            .rev()
            .find(|stage| self.outcome(**stage).is_succeeded())
            .copied()
    }

    /// The first stage in `order` this item failed at, with the reason.
    #[must_use]
    pub fn first_failure(&self, order: &[StageId]) -> Option<(StageId, String)> {
        order.iter().find_map(|stage| match self.outcome(*stage) {
            ItemOutcome::Failed(reason) => Some((*stage, reason)),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    items: Vec<WorkItem>,
    index: HashMap<String, usize>,
}

/// Registry of work items for one item family.
///
/// Interior mutability lets stage-runner workers mark outcomes concurrently;
/// registration order is preserved for reporting.
#[derive(Debug, Default)]
pub struct WorkItemRegistry {
    inner: RwLock<RegistryInner>,
}

impl WorkItemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new item. No two registrations may share a key.
    pub fn register(&self, item: WorkItem) -> Result<(), DuplicateKeyError> {
        let mut inner = self.inner.write();
        if inner.index.contains_key(item.key()) {
            return Err(DuplicateKeyError::new(item.key()));
        }
        let idx = inner.items.len();
        inner.index.insert(item.key().to_string(), idx);
        inner.items.push(item);
        Ok(())
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// All keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .items
            .iter()
            .map(|i| i.key.clone())
            .collect()
    }

    /// Marks an item as running at `stage`.
    pub fn mark_running(&self, key: &str, stage: StageId) {
        self.with_record(key, stage, |record| {
            record.outcome = ItemOutcome::Running;
        });
    }

    /// Commits a success at `stage` with its artifacts and reported data.
    pub fn mark_succeeded(
        &self,
        key: &str,
        stage: StageId,
        artifacts: Vec<PathBuf>,
        data: HashMap<String, serde_json::Value>,
        skipped: bool,
    ) {
        self.with_record(key, stage, |record| {
            record.outcome = ItemOutcome::Succeeded;
            record.artifacts = artifacts;
            record.data = data;
            record.skipped = skipped;
        });
    }

    /// Records a failure at `stage`.
    pub fn mark_failed(&self, key: &str, stage: StageId, reason: impl Into<String>) {
        let reason = reason.into();
        self.with_record(key, stage, |record| {
            record.outcome = ItemOutcome::Failed(reason);
        });
    }

    /// The outcome of `key` at `stage`, or `None` for an unknown key.
    #[must_use]
    pub fn outcome(&self, key: &str, stage: StageId) -> Option<ItemOutcome> {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .map(|&idx| inner.items[idx].outcome(stage))
    }

    /// Keys eligible for `plan`, in registration order.
    ///
    /// With a declared dependency, an item is eligible only if the upstream
    /// stage committed it as succeeded; entry stages take every registered
    /// item. An item that failed upstream is therefore invisible downstream
    /// while remaining in the registry for reporting.
    #[must_use]
    pub fn eligible_for(&self, plan: &StagePlan) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .items
            .iter()
            .filter(|item| match plan.depends_on {
                Some(prior) => item.outcome(prior).is_succeeded(),
                None => true,
            })
            .map(|item| item.key.clone())
            .collect()
    }

    /// Input paths the adapter receives for `key` under `plan`: the
    /// upstream stage's committed artifacts, or the item's initial
    /// artifacts for an entry stage.
    #[must_use]
    pub fn request_inputs(&self, key: &str, plan: &StagePlan) -> Vec<PathBuf> {
        let inner = self.inner.read();
        let Some(&idx) = inner.index.get(key) else {
            return Vec::new();
        };
        let item = &inner.items[idx];
        match plan.depends_on {
            Some(prior) => item.artifacts(prior).to_vec(),
            None => item.initial_artifacts.clone(),
        }
    }

    /// The opaque payload registered for `key`.
    #[must_use]
    pub fn payload(&self, key: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .and_then(|&idx| inner.items[idx].payload.clone())
    }

    /// A point-in-time clone of every item, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.inner.read().items.clone()
    }

    fn with_record(&self, key: &str, stage: StageId, f: impl FnOnce(&mut StageRecord)) {
        let mut inner = self.inner.write();
        let Some(&idx) = inner.index.get(key) else {
            return;
        };
        f(inner.items[idx].records.entry(stage).or_default());
    }
}
