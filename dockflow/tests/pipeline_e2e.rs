//! Engine-level integration tests: the stage runner, registries, and the
//! docking-join shape driven entirely by mock adapters.

use dockflow::prelude::*;
use dockflow::registry::{pair_key, Lineage};
use dockflow::report::ItemRecord;
use dockflow::testing::MockAdapter;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

fn ligand_registry(keys: &[(&str, &str)]) -> Arc<WorkItemRegistry> {
    let registry = WorkItemRegistry::new();
    for (key, smiles) in keys {
        registry.register(WorkItem::ligand(*key, *smiles)).unwrap();
    }
    Arc::new(registry)
}

/// A failure at stage N keeps the item out of stage N+1's eligible set, for
/// any worker count.
#[tokio::test]
async fn failed_item_absent_downstream_for_any_worker_count() {
    for workers in 1..=4 {
        let dir = tempfile::tempdir().unwrap();
        let prep = Arc::new(MockAdapter::new("prep"));
        prep.fail_for("L2", "conversion failed");
        let registry = ligand_registry(&[("L1", "CCO"), ("L2", "xxx"), ("L3", "CCN")]);

        let prep_plan = StagePlan::new(
            StageId::LigandPrep,
            dir.path().join("prep"),
            prep,
            workers,
        );
        StageRunner::new().execute(&prep_plan, &registry).await.unwrap();

        let next = Arc::new(MockAdapter::new("next"));
        let next_plan = StagePlan::new(StageId::Docking, dir.path().join("next"), next.clone(), workers)
            .with_dependency(StageId::LigandPrep);
        StageRunner::new().execute(&next_plan, &registry).await.unwrap();

        let mut seen = next.calls();
        seen.sort();
        assert_eq!(seen, vec!["L1", "L3"], "workers = {workers}");
    }
}

/// Exactly one failing item out of K leaves K-1 successes and the other
/// outputs untouched, for every worker count from 1 to K.
#[tokio::test]
async fn single_failure_isolated_for_every_worker_count() {
    const K: usize = 5;
    let keys: Vec<String> = (1..=K).map(|i| format!("L{i}")).collect();

    for workers in 1..=K {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(MockAdapter::new("prep"));
        adapter.fail_for("L3", "injected failure");
        let registry = WorkItemRegistry::new();
        for key in &keys {
            registry.register(WorkItem::ligand(key, "CCO")).unwrap();
        }
        let registry = Arc::new(registry);

        let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter, workers);
        let report = StageRunner::new().execute(&plan, &registry).await.unwrap();

        assert_eq!(report.succeeded, K - 1, "workers = {workers}");
        assert_eq!(report.failed(), 1, "workers = {workers}");
        assert_eq!(report.failures[0].key, "L3");
        for key in keys.iter().filter(|k| *k != "L3") {
            assert!(dir.path().join(format!("{key}.out")).exists());
        }
        assert!(!dir.path().join("L3.out").exists());
    }
}

/// Rerunning a stage in resume mode re-invokes the adapter for nothing that
/// already committed, and the output file set is unchanged.
#[tokio::test]
async fn resume_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(MockAdapter::new("prep"));
    let registry = ligand_registry(&[("L1", "CCO"), ("L2", "CCN")]);
    let plan = StagePlan::new(StageId::LigandPrep, dir.path(), adapter.clone(), 2);
    let runner = StageRunner::new().with_resume(true);

    runner.execute(&plan, &registry).await.unwrap();
    let listing = |dir: &std::path::Path| {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    };
    let first_listing = listing(dir.path());
    assert_eq!(adapter.call_count(), 2);

    let rerun_registry = ligand_registry(&[("L1", "CCO"), ("L2", "CCN")]);
    let report = runner.execute(&plan, &rerun_registry).await.unwrap();

    assert_eq!(adapter.call_count(), 2, "no adapter re-invocation on resume");
    assert_eq!(report.skipped, 2);
    assert_eq!(listing(dir.path()), first_listing);
}

/// worker_count = 0 fails before the spy adapter records a single call.
#[tokio::test]
async fn zero_workers_fail_before_any_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let spy = Arc::new(MockAdapter::new("spy"));
    let registry = ligand_registry(&[("L1", "CCO")]);
    let plan = StagePlan::new(StageId::LigandPrep, dir.path(), spy.clone(), 0);

    let err = StageRunner::new().execute(&plan, &registry).await.unwrap_err();
    assert!(matches!(
        err,
        DockflowError::Configuration(ConfigurationError::InvalidWorkerCount(0))
    ));
    assert_eq!(spy.call_count(), 0);
}

/// The three-ligand scenario: L3's conversion fails, docking sees exactly
/// {L1, L2}, and the final records tell the story per item.
#[tokio::test]
async fn three_ligand_chain_reports_furthest_stages() {
    let dir = tempfile::tempdir().unwrap();

    // Ligand preparation with a failing third record.
    let manifest =
        RunManifest::parse_str("L1 CCO\nL2 c1ccccc1\nL3 badsmiles\n", MalformedLinePolicy::Warn)
            .unwrap();
    let ligands = WorkItemRegistry::new();
    for record in &manifest.records {
        ligands
            .register(WorkItem::ligand(&record.id, &record.smiles))
            .unwrap();
    }
    let ligands = Arc::new(ligands);

    let prep = Arc::new(MockAdapter::new("ligand_prep"));
    prep.fail_for("L3", "SMILES conversion produced no molecule");
    let prep_plan = StagePlan::new(StageId::LigandPrep, dir.path().join("ligand_pdbqt"), prep, 2);
    let runner = StageRunner::new();
    let prep_report = runner.execute(&prep_plan, &ligands).await.unwrap();
    assert_eq!(prep_report.succeeded, 2);
    assert_eq!(prep_report.failed(), 1);

    // Docking join: one receptor against every prepared ligand.
    let receptor_pdbqt = PathBuf::from("/prebuilt/1abc.pdbqt");
    let pairs = WorkItemRegistry::new();
    for item in ligands.snapshot() {
        if !item.outcome(StageId::LigandPrep).is_succeeded() {
            continue;
        }
        let ligand_artifact = item.artifacts(StageId::LigandPrep)[0].clone();
        pairs
            .register(WorkItem::pair(
                pair_key("1abc", item.key()),
                Lineage {
                    receptor: "1abc".to_string(),
                    ligand: item.key().to_string(),
                },
                vec![receptor_pdbqt.clone(), ligand_artifact],
            ))
            .unwrap();
    }
    let pairs = Arc::new(pairs);

    let dock = Arc::new(MockAdapter::new("docking"));
    let dock_plan = StagePlan::new(StageId::Docking, dir.path().join("docking"), dock.clone(), 2);
    runner.execute(&dock_plan, &pairs).await.unwrap();

    let mut docked = dock.calls();
    docked.sort();
    assert_eq!(docked, vec!["1abc__L1", "1abc__L2"]);

    let rescore = Arc::new(MockAdapter::new("rescoring"));
    let rescore_plan =
        StagePlan::new(StageId::Rescoring, dir.path().join("rescoring"), rescore, 2)
            .with_dependency(StageId::Docking);
    runner.execute(&rescore_plan, &pairs).await.unwrap();

    // Final records.
    let terminal = StageId::Rescoring;
    let ligand_chain = [StageId::LigandPrep];
    let pair_chain = [StageId::Docking, StageId::Rescoring];
    let mut records: Vec<ItemRecord> = Vec::new();
    for item in ligands.snapshot() {
        records.push(ItemRecord::from_item(&item, &ligand_chain, terminal));
    }
    for item in pairs.snapshot() {
        records.push(ItemRecord::from_item(&item, &pair_chain, terminal));
    }

    let by_key: HashMap<&str, &ItemRecord> =
        records.iter().map(|r| (r.key.as_str(), r)).collect();
    let l3 = by_key["L3"];
    assert_eq!(l3.failed_stage, Some(StageId::LigandPrep));
    assert!(l3.failure.as_deref().unwrap().contains("no molecule"));
    assert!(by_key["1abc__L1"].reached_terminal);
    assert!(by_key["1abc__L2"].reached_terminal);
    assert!(!by_key["L1"].reached_terminal, "ligands never reach the pipeline terminal");

    assert_eq!(RunOutcome::evaluate(&records), RunOutcome::PartialSuccess);
}
