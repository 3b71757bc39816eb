// Snapshot Persistence Integration Test
// Saves a ledger to disk, restores it, and checks every guard survives

mod common;

use anyhow::Result;
use common::{new_ledger, operator, principal, reading};
use meter_ledger::config::{Config, LedgerConfig};
use meter_ledger::services::{Authorities, Categorized, Ledger};
use meter_ledger::startup::{
    build_state, persist_snapshot, spawn_background_tasks, stop_background_tasks,
};
use meter_ledger::storage::SnapshotStore;

fn populated_ledger() -> Ledger {
    let mut ledger = new_ledger(&LedgerConfig::default());
    let meter = principal("M");
    ledger.register_meter(&meter, 1, 0).unwrap();
    ledger.set_settlement_rate(&operator(), 1, 250).unwrap();
    ledger
        .register_public_key(&operator(), &principal("other"), vec![2; 33])
        .unwrap();
    ledger
        .submit_reading(&meter, &reading(&meter, 1, 40, 1), 1)
        .unwrap();
    ledger.advance_period(&operator(), 2).unwrap();
    ledger.calculate_bill(&meter, 0, 3).unwrap();
    ledger
}

#[tokio::test]
async fn test_missing_snapshot_loads_as_none() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SnapshotStore::new(dir.path().join("ledger.json"));
    assert!(store.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_snapshot_round_trip_through_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SnapshotStore::new(dir.path().join("state").join("ledger.json"));

    let ledger = populated_ledger();
    let snapshot = ledger.snapshot();
    store.save(&snapshot).await?;

    let loaded = store.load().await?.expect("snapshot was written");
    assert_eq!(loaded, snapshot);

    let mut restored = Ledger::restore(
        &LedgerConfig::default(),
        Authorities::single(operator()),
        loaded,
    )?;
    let meter = principal("M");

    assert_eq!(restored.current_period(), 1);
    assert_eq!(restored.meter(&meter).unwrap().last_reading, 40);
    assert_eq!(restored.get_bill(&meter, 0).unwrap().amount_due, 10_000);
    assert_eq!(restored.period_totals(0).unwrap().total_billed, 10_000);

    // Replays and re-bills are still refused after the restart
    let err = restored
        .submit_reading(&meter, &reading(&meter, 1, 50, 2), 2)
        .unwrap_err();
    assert_eq!(err.code(), "PROOF_REUSED");
    let err = restored.calculate_bill(&meter, 0, 4).unwrap_err();
    assert_eq!(err.code(), "ALREADY_CALCULATED");
    Ok(())
}

#[tokio::test]
async fn test_tampered_totals_are_rejected_on_restore() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.json");
    let store = SnapshotStore::new(&path);
    store.save(&populated_ledger().snapshot()).await?;

    let mut json: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
    json["billing"]["period_totals"][0][1]["total_billed"] = serde_json::json!(1);
    tokio::fs::write(&path, serde_json::to_vec(&json)?).await?;

    let tampered = store.load().await?.expect("snapshot was written");
    let restored = Ledger::restore(
        &LedgerConfig::default(),
        Authorities::single(operator()),
        tampered,
    );
    assert!(restored.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_do_not_collide() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SnapshotStore::new(dir.path().join("ledger.json"));
    let snapshot = populated_ledger().snapshot();

    for _ in 0..100 {
        let first = store.clone();
        let second = store.clone();
        let (a, b) = tokio::join!(
            tokio::spawn({
                let snapshot = snapshot.clone();
                async move { first.save(&snapshot).await }
            }),
            tokio::spawn({
                let snapshot = snapshot.clone();
                async move { second.save(&snapshot).await }
            }),
        );
        a??;
        b??;
    }

    assert_eq!(store.load().await?, Some(snapshot));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_final_save_runs_after_snapshot_writer_stops() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.json");
    let config = Config {
        environment: "test".to_string(),
        port: 0,
        log_level: "debug".to_string(),
        operator_api_key: "key".to_string(),
        authority: operator(),
        snapshot_path: Some(path.clone()),
        snapshot_interval_secs: 1,
        ledger: LedgerConfig::default(),
    };
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let state = build_state(
        config,
        populated_ledger(),
        metrics,
        Some(SnapshotStore::new(&path)),
    );

    let writer = spawn_background_tasks(&state);
    assert!(writer.is_some());

    let meter = principal("M");
    state
        .ledger
        .submit_reading(&meter, &reading(&meter, 2, 60, 2), 2)
        .await?;

    stop_background_tasks(writer).await;
    persist_snapshot(&state).await?;

    let saved = SnapshotStore::new(&path).load().await?.expect("final snapshot");
    assert_eq!(saved, state.ledger.snapshot().await);
    Ok(())
}
