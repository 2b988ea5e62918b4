//! The stage runner: one adapter fanned over every eligible work item.
//!
//! All "spawn a bounded pool over a file list" logic in the pipeline lives
//! here, parameterized by the stage plan. A worker failure is recorded
//! against its item and never propagates to siblings - one bad ligand does
//! not stop the batch.

use crate::cancellation::CancellationToken;
use crate::errors::{ConfigurationError, DockflowError, ProcessorError};
use crate::processor::{outputs_present, verify_outputs, ProcessRequest};
use crate::registry::WorkItemRegistry;
use crate::report::StageReport;
use crate::stage::StagePlan;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Executes stage plans over a work-item registry.
#[derive(Debug, Clone, Default)]
pub struct StageRunner {
    resume: bool,
    cancel: CancellationToken,
}

impl StageRunner {
    /// Creates a runner with resume disabled and a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables resume mode.
    ///
    /// In resume mode an item whose declared outputs already exist and are
    /// non-empty is committed as succeeded without re-invoking the adapter.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Attaches a shared cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs `plan` over every eligible item in `registry`.
    ///
    /// Eligibility and input paths come from the registry (an item failed
    /// upstream is invisible here). Items are dispatched to a pool of
    /// `plan.worker_count` workers; each invocation is bounded by
    /// `plan.item_timeout`. The report enumerates items in registration
    /// order regardless of completion order.
    ///
    /// # Errors
    ///
    /// Fails fast with a [`ConfigurationError`] for a zero worker count -
    /// before any adapter is invoked - and surfaces IO errors creating the
    /// output directory. Per-item processor errors never surface here.
    pub async fn execute(
        &self,
        plan: &StagePlan,
        registry: &Arc<WorkItemRegistry>,
    ) -> Result<StageReport, DockflowError> {
        if plan.worker_count == 0 {
            return Err(ConfigurationError::InvalidWorkerCount(0).into());
        }
        std::fs::create_dir_all(&plan.output_dir)?;

        let eligible = registry.eligible_for(plan);
        info!(
            stage = %plan.stage,
            items = eligible.len(),
            workers = plan.worker_count,
            "stage started"
        );

        let semaphore = Arc::new(Semaphore::new(plan.worker_count));
        let mut join_set: JoinSet<()> = JoinSet::new();

        for key in &eligible {
            if self.resume {
                let expected = plan.adapter.expected_outputs(key, &plan.output_dir);
                if outputs_present(&expected) {
                    debug!(stage = %plan.stage, key = %key, "resume hit, skipping adapter");
                    registry.mark_succeeded(key, plan.stage, expected, HashMap::new(), true);
                    continue;
                }
            }
            if self.cancel.is_cancelled() {
                // Stop dispatching; undispatched items stay pending for a
                // future resume run.
                break;
            }

            let request = ProcessRequest {
                key: key.clone(),
                inputs: registry.request_inputs(key, plan),
                output_dir: plan.output_dir.clone(),
                payload: registry.payload(key),
            };
            let semaphore = Arc::clone(&semaphore);
            let adapter = Arc::clone(&plan.adapter);
            let registry = Arc::clone(registry);
            let cancel = self.cancel.clone();
            let stage = plan.stage;
            let timeout = plan.item_timeout;
            let key = key.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }
                registry.mark_running(&key, stage);

                let result = match tokio::time::timeout(timeout, adapter.process(&request)).await
                {
                    Err(_) => Err(ProcessorError::timeout(adapter.name(), timeout)),
                    Ok(inner) => inner,
                };
                let result = result
                    .and_then(|outcome| verify_outputs(adapter.name(), &outcome.outputs).map(|()| outcome));

                match result {
                    Ok(outcome) => {
                        debug!(stage = %stage, key = %key, "item succeeded");
                        registry.mark_succeeded(&key, stage, outcome.outputs, outcome.data, false);
                    }
                    Err(err) => {
                        discard_partial(&adapter.expected_outputs(&key, &request.output_dir));
                        warn!(stage = %stage, key = %key, error = %err, "item failed");
                        registry.mark_failed(&key, stage, err.to_string());
                    }
                }
            });
        }

        while join_set.join_next().await.is_some() {}

        let report = StageReport::collect(plan.stage, &eligible, registry);
        if report.all_failed() {
            warn!(stage = %plan.stage, attempted = report.attempted, "stage produced zero successes");
        }
        info!(
            stage = %plan.stage,
            attempted = report.attempted,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed(),
            "stage finished"
        );
        Ok(report)
    }
}

/// Removes files a failed invocation may have partially written, so a later
/// resume run cannot mistake them for committed outputs.
fn discard_partial(expected: &[PathBuf]) {
    for path in expected {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ItemOutcome, WorkItem};
    use crate::stage::{StageId, StagePlan};
    use crate::testing::MockAdapter;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn ligand_registry(keys: &[&str]) -> Arc<WorkItemRegistry> {
        let registry = WorkItemRegistry::new();
        for key in keys {
            registry.register(WorkItem::ligand(*key, "CCO")).unwrap();
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_zero_worker_count_fails_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter.clone(), 0);
        let registry = ligand_registry(&["L1"]);

        let err = StageRunner::new().execute(&plan, &registry).await.unwrap_err();
        assert!(matches!(
            err,
            DockflowError::Configuration(ConfigurationError::InvalidWorkerCount(0))
        ));
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        adapter.fail_for("L2", "injected failure");
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter.clone(), 2);
        let registry = ligand_registry(&["L1", "L2", "L3"]);

        let report = StageRunner::new().execute(&plan, &registry).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].key, "L2");
        assert!(dir.path().join("L1.out").exists());
        assert!(dir.path().join("L3.out").exists());
    }

    #[tokio::test]
    async fn test_report_order_matches_registration_under_reversed_completion() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        // First item finishes last.
        adapter.delay_for("L1", Duration::from_millis(80));
        adapter.delay_for("L2", Duration::from_millis(40));
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter, 3);
        let registry = ligand_registry(&["L1", "L2", "L3"]);

        let report = StageRunner::new().execute(&plan, &registry).await.unwrap();
        let order: Vec<_> = report.results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(order, vec!["L1", "L2", "L3"]);
    }

    #[tokio::test]
    async fn test_resume_skips_committed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter.clone(), 2);
        let registry = ligand_registry(&["L1", "L2"]);

        let runner = StageRunner::new().with_resume(true);
        let first = runner.execute(&plan, &registry).await.unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(adapter.call_count(), 2);

        // Fresh registry, same output tree: nothing should be re-invoked.
        let registry2 = ligand_registry(&["L1", "L2"]);
        let second = runner.execute(&plan, &registry2).await.unwrap();
        assert_eq!(second.succeeded, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(adapter.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_marks_item_failed() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        adapter.delay_for("L1", Duration::from_secs(5));
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter, 1)
            .with_item_timeout(Duration::from_millis(50));
        let registry = ligand_registry(&["L1", "L2"]);

        let report = StageRunner::new().execute(&plan, &registry).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert!(report.failures[0].reason.contains("timed out"));
        // No partial output may survive a timeout.
        assert!(!dir.path().join("L1.out").exists());
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        let token = CancellationToken::new();
        token.cancel("test interrupt");
        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter.clone(), 2);
        let registry = ligand_registry(&["L1", "L2"]);

        let runner = StageRunner::new().with_cancellation(token);
        let report = runner.execute(&plan, &registry).await.unwrap();

        assert_eq!(adapter.call_count(), 0);
        assert_eq!(report.attempted, 0);
        assert_eq!(
            registry.outcome("L1", StageId::LigandPrep),
            Some(ItemOutcome::Pending)
        );
    }

    #[tokio::test]
    async fn test_empty_eligible_set_reports_zero_attempted() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("mock"));
        let plan = StagePlan::new(StageId::Docking, dir.path(), adapter.clone(), 2)
            .with_dependency(StageId::LigandPrep);
        let registry = ligand_registry(&["L1"]); // never succeeded at ligand_prep

        let report = StageRunner::new().execute(&plan, &registry).await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(adapter.call_count(), 0);
    }
}
