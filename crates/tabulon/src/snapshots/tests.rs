use super::{SerializedSnapshot, TableSnapshotStore};
use crate::{StorageConfig, store::MemoryTableStore};

async fn snapshot_store() -> TableSnapshotStore<MemoryTableStore> {
    let store = TableSnapshotStore::new(&StorageConfig::default(), MemoryTableStore::new());
    store.initialize().await.unwrap();
    store
}

fn snapshot(sequence_number: u32) -> SerializedSnapshot {
    SerializedSnapshot {
        aggregate_sequence_number: sequence_number,
        data: format!(r#"{{"state":{sequence_number}}}"#),
        metadata: format!(r#"{{"sequence":{sequence_number}}}"#),
    }
}

#[tokio::test]
async fn get_of_a_missing_snapshot_returns_none() {
    let store = snapshot_store().await;

    let result = store.get_snapshot("Fund", "fund-a").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn the_latest_snapshot_wins_regardless_of_write_order() {
    let store = snapshot_store().await;

    for sequence_number in [1, 5, 3] {
        store
            .set_snapshot("Fund", "fund-a", snapshot(sequence_number))
            .await
            .unwrap();
    }

    let latest = store.get_snapshot("Fund", "fund-a").await.unwrap().unwrap();
    assert_eq!(latest.data, r#"{"state":5}"#);
    assert_eq!(latest.metadata, r#"{"sequence":5}"#);
}

#[tokio::test]
async fn setting_the_same_sequence_number_replaces_the_snapshot() {
    let store = snapshot_store().await;

    store.set_snapshot("Fund", "fund-a", snapshot(2)).await.unwrap();
    store
        .set_snapshot(
            "Fund",
            "fund-a",
            SerializedSnapshot {
                aggregate_sequence_number: 2,
                data: "replacement".to_owned(),
                metadata: "{}".to_owned(),
            },
        )
        .await
        .unwrap();

    let latest = store.get_snapshot("Fund", "fund-a").await.unwrap().unwrap();
    assert_eq!(latest.data, "replacement");
}

#[tokio::test]
async fn aggregates_do_not_share_snapshots() {
    let store = snapshot_store().await;

    store.set_snapshot("Fund", "fund-a", snapshot(1)).await.unwrap();
    store.set_snapshot("Fund", "fund-b", snapshot(9)).await.unwrap();

    let a = store.get_snapshot("Fund", "fund-a").await.unwrap().unwrap();
    assert_eq!(a.data, r#"{"state":1}"#);

    // Same identity under a different aggregate name is a different
    // partition.
    assert!(store.get_snapshot("Trust", "fund-a").await.unwrap().is_none());
}

#[tokio::test]
async fn purge_removes_only_the_requested_aggregate() {
    let store = snapshot_store().await;

    for sequence_number in 1..=4 {
        store
            .set_snapshot("Fund", "fund-a", snapshot(sequence_number))
            .await
            .unwrap();
    }
    store.set_snapshot("Fund", "fund-b", snapshot(7)).await.unwrap();

    store.purge_snapshots("Fund", "fund-a").await.unwrap();

    assert!(store.get_snapshot("Fund", "fund-a").await.unwrap().is_none());
    assert!(store.get_snapshot("Fund", "fund-b").await.unwrap().is_some());
}
