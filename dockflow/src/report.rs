//! Stage reports and the final run summary.
//!
//! Reports enumerate items in registration (manifest) order regardless of
//! worker completion order, so two runs over the same inputs produce the
//! same report layout. The run summary is written as `report.json` even when
//! the run partially or totally fails - auditability does not depend on
//! success.

use crate::registry::{ItemKind, ItemOutcome, Lineage, WorkItem, WorkItemRegistry};
use crate::stage::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Process exit code for configuration-class failures (raised before any
/// stage runs).
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;

/// One item's outcome within a stage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// The work-item key.
    pub key: String,
    /// The recorded outcome.
    pub outcome: ItemOutcome,
    /// True if satisfied from existing artifacts without invoking the
    /// adapter (resume hit).
    pub skipped: bool,
}

/// One failed item with its reason, for the failure roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The work-item key.
    pub key: String,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Per-stage aggregate produced by the stage runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// The stage this report covers.
    pub stage: StageId,
    /// Every eligible item in registration order.
    pub results: Vec<ItemResult>,
    /// Items dispatched or resumed (excludes items left pending by
    /// cancellation).
    pub attempted: usize,
    /// Items that succeeded, including resume hits.
    pub succeeded: usize,
    /// Resume hits within `succeeded`.
    pub skipped: usize,
    /// Failed items with reasons, in registration order.
    pub failures: Vec<ItemFailure>,
}

impl StageReport {
    /// Builds the report for `stage` over `keys` from registry state.
    ///
    /// `keys` must be the eligible set in registration order; the report
    /// preserves that order.
    #[must_use]
    pub fn collect(stage: StageId, keys: &[String], registry: &WorkItemRegistry) -> Self {
        let mut results = Vec::with_capacity(keys.len());
        let mut failures = Vec::new();
        let mut attempted = 0;
        let mut succeeded = 0;
        let mut skipped = 0;

        let snapshot: HashMap<String, WorkItem> = registry
            .snapshot()
            .into_iter()
            .map(|item| (item.key().to_string(), item))
            .collect();

        for key in keys {
            let Some(item) = snapshot.get(key) else {
                continue;
            };
            let outcome = item.outcome(stage);
            let was_skipped = item.was_skipped(stage);
            match &outcome {
                ItemOutcome::Succeeded => {
                    attempted += 1;
                    succeeded += 1;
                    if was_skipped {
                        skipped += 1;
                    }
                }
                ItemOutcome::Failed(reason) => {
                    attempted += 1;
                    failures.push(ItemFailure {
                        key: key.clone(),
                        reason: reason.clone(),
                    });
                }
                ItemOutcome::Pending | ItemOutcome::Running => {}
            }
            results.push(ItemResult {
                key: key.clone(),
                outcome,
                skipped: was_skipped,
            });
        }

        Self {
            stage,
            results,
            attempted,
            succeeded,
            skipped,
            failures,
        }
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True if at least one item failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// True if the stage attempted work and nothing succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }
}

/// One item's final record in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    /// The work-item key.
    pub key: String,
    /// The item family.
    pub kind: ItemKind,
    /// Parent keys, for docking pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
    /// The last stage the item succeeded at.
    pub furthest_stage: Option<StageId>,
    /// The stage the item first failed at, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageId>,
    /// The failure reason, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// True if the item reached its chain's terminal stage.
    pub reached_terminal: bool,
    /// Structured results reported by adapters (docking/rescoring scores).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scores: HashMap<String, serde_json::Value>,
}

impl ItemRecord {
    /// Builds a record from an item, its chain's stage order, and the
    /// pipeline's terminal stage.
    ///
    /// `reached_terminal` reflects the pipeline terminal, not the chain's
    /// last stage: a ligand that finished preparation has not reached the
    /// terminal stage unless one of its stages *is* the terminal.
    #[must_use]
    pub fn from_item(item: &WorkItem, chain: &[StageId], terminal: StageId) -> Self {
        let furthest_stage = item.furthest_stage(chain);
        let failure = item.first_failure(chain);
        let mut scores = HashMap::new();
        for stage in chain {
            if let Some(data) = item.data(*stage) {
                scores.extend(data.clone());
            }
        }
        Self {
            key: item.key().to_string(),
            kind: item.kind(),
            lineage: item.lineage().cloned(),
            furthest_stage,
            failed_stage: failure.as_ref().map(|(stage, _)| *stage),
            failure: failure.map(|(_, reason)| reason),
            reached_terminal: item.outcome(terminal).is_succeeded(),
            scores,
        }
    }
}

/// Run-level outcome, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every item reached its terminal stage.
    AllSucceeded,
    /// Some items reached the terminal stage, some failed along the way.
    PartialSuccess,
    /// No item reached the terminal stage.
    TotalFailure,
}

impl RunOutcome {
    /// Evaluates the run outcome from the final item records.
    ///
    /// Run-level success means at least one item reached the terminal
    /// stage; the all/partial split reports whether any item failed
    /// anywhere along the way.
    #[must_use]
    pub fn evaluate(items: &[ItemRecord]) -> Self {
        let reached = items.iter().filter(|i| i.reached_terminal).count();
        let failed = items.iter().filter(|i| i.failure.is_some()).count();
        if reached == 0 {
            Self::TotalFailure
        } else if failed == 0 {
            Self::AllSucceeded
        } else {
            Self::PartialSuccess
        }
    }

    /// The process exit code for this outcome.
    ///
    /// `0` all succeeded, `1` partial success, `3` total failure;
    /// configuration-class failures exit with
    /// [`CONFIG_ERROR_EXIT_CODE`] before a summary exists.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AllSucceeded => 0,
            Self::PartialSuccess => 1,
            Self::TotalFailure => 3,
        }
    }
}

/// The aggregated result of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-stage aggregates in execution order.
    pub stage_reports: Vec<StageReport>,
    /// Final per-item records (ligands, receptors, then pairs).
    pub items: Vec<ItemRecord>,
    /// The run-level outcome.
    pub outcome: RunOutcome,
    /// Cancellation reason, if the run was interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<String>,
}

impl RunSummary {
    /// Serializes the summary to pretty JSON at `path`.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(key: &str, reached: bool, failure: Option<&str>) -> ItemRecord {
        ItemRecord {
            key: key.to_string(),
            kind: ItemKind::DockingPair,
            lineage: None,
            furthest_stage: None,
            failed_stage: None,
            failure: failure.map(String::from),
            reached_terminal: reached,
            scores: HashMap::new(),
        }
    }

    #[test]
    fn test_outcome_all_succeeded() {
        let items = vec![record("a", true, None), record("b", true, None)];
        assert_eq!(RunOutcome::evaluate(&items), RunOutcome::AllSucceeded);
        assert_eq!(RunOutcome::AllSucceeded.exit_code(), 0);
    }

    #[test]
    fn test_outcome_partial() {
        let items = vec![record("a", true, None), record("b", false, Some("boom"))];
        assert_eq!(RunOutcome::evaluate(&items), RunOutcome::PartialSuccess);
        assert_eq!(RunOutcome::PartialSuccess.exit_code(), 1);
    }

    #[test]
    fn test_outcome_total_failure() {
        let items = vec![record("a", false, Some("boom"))];
        assert_eq!(RunOutcome::evaluate(&items), RunOutcome::TotalFailure);
        assert_eq!(RunOutcome::TotalFailure.exit_code(), 3);
    }

    #[test]
    fn test_outcome_empty_set_is_total_failure() {
        assert_eq!(RunOutcome::evaluate(&[]), RunOutcome::TotalFailure);
    }

    #[test]
    fn test_stage_report_counts_and_order() {
        use crate::registry::WorkItem;
        use std::collections::HashMap as Map;

        let registry = WorkItemRegistry::new();
        for key in ["L1", "L2", "L3"] {
            registry.register(WorkItem::ligand(key, "CCO")).unwrap();
        }
        registry.mark_succeeded("L1", StageId::LigandPrep, vec![], Map::new(), false);
        registry.mark_failed("L2", StageId::LigandPrep, "bad smiles");
        registry.mark_succeeded("L3", StageId::LigandPrep, vec![], Map::new(), true);

        let keys = registry.keys();
        let report = StageReport::collect(StageId::LigandPrep, &keys, &registry);

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].key, "L2");
        let order: Vec<_> = report.results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["L1", "L2", "L3"]);
    }
}
