use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{
    BatchOperation, BlobStore, Filter, MemoryBlobStore, MemoryTableStore, PARTITION_KEY,
    TableEntity, TableQuery, TableStore, VersionToken, WriteOutcome,
};
use crate::Error;

const TABLE: &str = "TestRows";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TestRow {
    partition_key: String,
    row_key: String,
    payload: String,
}

impl TestRow {
    fn new(partition_key: &str, row_key: &str, payload: &str) -> Self {
        Self {
            partition_key: partition_key.to_owned(),
            row_key: row_key.to_owned(),
            payload: payload.to_owned(),
        }
    }
}

impl TableEntity for TestRow {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

async fn table_store() -> MemoryTableStore {
    let store = MemoryTableStore::new();
    store.create_table_if_missing(TABLE).await.unwrap();
    store
}

async fn insert_rows(store: &MemoryTableStore, rows: Vec<TestRow>) {
    for chunk in rows.chunks(super::MAX_BATCH_OPERATIONS) {
        let batch = chunk
            .iter()
            .cloned()
            .map(BatchOperation::Insert)
            .collect::<Vec<_>>();
        store.execute_batch(TABLE, batch).await.unwrap();
    }
}

#[tokio::test]
async fn retrieve_from_a_missing_table_fails() {
    let store = MemoryTableStore::new();

    let result = store.retrieve::<TestRow>("NoSuchTable", "p", "r").await;
    assert!(matches!(result, Err(Error::StorageUnavailable { .. })));
}

#[tokio::test]
async fn retrieve_missing_row_returns_none() {
    let store = table_store().await;

    let row = store.retrieve::<TestRow>(TABLE, "p", "r").await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn inserted_rows_round_trip() {
    let store = table_store().await;
    let row = TestRow::new("p", "r", "payload");
    insert_rows(&store, vec![row.clone()]).await;

    let read = store
        .retrieve::<TestRow>(TABLE, "p", "r")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, row);
}

#[tokio::test]
async fn plain_insert_of_an_existing_row_fails_atomically() {
    let store = table_store().await;
    insert_rows(&store, vec![TestRow::new("p", "a", "first")]).await;

    let batch = vec![
        BatchOperation::Insert(TestRow::new("p", "b", "new")),
        BatchOperation::Insert(TestRow::new("p", "a", "duplicate")),
    ];
    let error = store.execute_batch(TABLE, batch).await.unwrap_err();
    assert!(matches!(error, Error::EntityAlreadyExists { .. }));

    // The failed batch must not have applied partially.
    let untouched = store.retrieve::<TestRow>(TABLE, "p", "b").await.unwrap();
    assert!(untouched.is_none());
    let original = store
        .retrieve::<TestRow>(TABLE, "p", "a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.payload, "first");
}

#[tokio::test]
async fn insert_or_replace_overwrites() {
    let store = table_store().await;
    insert_rows(&store, vec![TestRow::new("p", "a", "first")]).await;

    let batch = vec![BatchOperation::InsertOrReplace(TestRow::new(
        "p", "a", "second",
    ))];
    store.execute_batch(TABLE, batch).await.unwrap();

    let row = store
        .retrieve::<TestRow>(TABLE, "p", "a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.payload, "second");
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let store = table_store().await;

    let error = store
        .execute_batch::<TestRow>(TABLE, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InvalidBatch { .. }));
}

#[tokio::test]
async fn oversized_batches_are_rejected() {
    let store = table_store().await;
    let batch = (0..=super::MAX_BATCH_OPERATIONS)
        .map(|i| BatchOperation::Insert(TestRow::new("p", &format!("{i:03}"), "x")))
        .collect::<Vec<_>>();

    let error = store.execute_batch(TABLE, batch).await.unwrap_err();
    assert!(matches!(error, Error::InvalidBatch { .. }));
}

#[tokio::test]
async fn cross_partition_batches_are_rejected() {
    let store = table_store().await;
    let batch = vec![
        BatchOperation::Insert(TestRow::new("p1", "a", "x")),
        BatchOperation::Insert(TestRow::new("p2", "b", "x")),
    ];

    let error = store.execute_batch(TABLE, batch).await.unwrap_err();
    assert!(matches!(error, Error::InvalidBatch { .. }));
}

#[tokio::test]
async fn deleting_a_missing_row_fails() {
    let store = table_store().await;

    let batch = vec![BatchOperation::<TestRow>::Delete {
        partition_key: "p".to_owned(),
        row_key: "a".to_owned(),
    }];
    let error = store.execute_batch(TABLE, batch).await.unwrap_err();
    assert!(matches!(error, Error::EntityNotFound { .. }));
}

#[tokio::test]
async fn queries_return_rows_in_key_order() {
    let store = table_store().await;
    insert_rows(
        &store,
        vec![
            TestRow::new("p", "03", "c"),
            TestRow::new("p", "01", "a"),
            TestRow::new("p", "02", "b"),
        ],
    )
    .await;

    let segment = store
        .query_segmented::<TestRow>(TABLE, &TableQuery::all(), None)
        .await
        .unwrap();

    let row_keys: Vec<&str> = segment.results.iter().map(|r| r.row_key.as_str()).collect();
    assert_eq!(row_keys, vec!["01", "02", "03"]);
    assert!(segment.continuation.is_none());
}

#[tokio::test]
async fn queries_apply_filter_and_take() {
    let store = table_store().await;
    insert_rows(
        &store,
        (0..10)
            .map(|i| TestRow::new("p", &format!("{i:02}"), "x"))
            .collect(),
    )
    .await;
    insert_rows(&store, vec![TestRow::new("q", "00", "other")]).await;

    let query = TableQuery::filtered(Filter::equal(PARTITION_KEY, "p")).take(4);
    let segment = store
        .query_segmented::<TestRow>(TABLE, &query, None)
        .await
        .unwrap();

    assert_eq!(segment.results.len(), 4);
    assert!(segment.results.iter().all(|r| r.partition_key == "p"));
}

#[tokio::test]
async fn long_queries_hand_out_continuations() {
    let store = table_store().await;
    insert_rows(
        &store,
        (0..1205)
            .map(|i| TestRow::new("p", &format!("{i:04}"), "x"))
            .collect(),
    )
    .await;

    let query = TableQuery::all();
    let first = store
        .query_segmented::<TestRow>(TABLE, &query, None)
        .await
        .unwrap();
    assert_eq!(first.results.len(), 1000);

    let continuation = first.continuation.expect("a continuation token");
    let second = store
        .query_segmented::<TestRow>(TABLE, &query, Some(continuation))
        .await
        .unwrap();
    assert_eq!(second.results.len(), 205);
    assert!(second.continuation.is_none());
}

#[tokio::test]
async fn blob_create_if_missing_preserves_existing_content() {
    let blobs = MemoryBlobStore::new();
    blobs.create_container_if_missing().await.unwrap();

    blobs
        .create_if_missing("counter", Bytes::from_static(b"first"))
        .await
        .unwrap();
    blobs
        .create_if_missing("counter", Bytes::from_static(b"second"))
        .await
        .unwrap();

    let (content, _) = blobs.read_value("counter").await.unwrap();
    assert_eq!(&content[..], b"first");
}

#[tokio::test]
async fn blob_operations_require_the_container() {
    let blobs = MemoryBlobStore::new();

    let error = blobs.read_value("counter").await.unwrap_err();
    assert!(matches!(error, Error::StorageUnavailable { .. }));
}

#[tokio::test]
async fn conditional_writes_reject_stale_tokens() {
    let blobs = MemoryBlobStore::new();
    blobs.create_container_if_missing().await.unwrap();
    blobs
        .create_if_missing("counter", Bytes::from_static(b"v1"))
        .await
        .unwrap();

    let (_, token) = blobs.read_value("counter").await.unwrap();

    let outcome = blobs
        .conditional_write("counter", Bytes::from_static(b"v2"), &token)
        .await
        .unwrap();
    let WriteOutcome::Committed(fresh) = outcome else {
        panic!("expected the first write to commit");
    };

    // The original token is now stale.
    let outcome = blobs
        .conditional_write("counter", Bytes::from_static(b"v3"), &token)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Conflict);

    let (content, current) = blobs.read_value("counter").await.unwrap();
    assert_eq!(&content[..], b"v2");
    assert_eq!(current, fresh);
}

#[tokio::test]
async fn stale_token_of_another_blob_never_matches() {
    let blobs = MemoryBlobStore::new();
    blobs.create_container_if_missing().await.unwrap();
    blobs
        .create_if_missing("one", Bytes::from_static(b"1"))
        .await
        .unwrap();
    blobs
        .create_if_missing("two", Bytes::from_static(b"2"))
        .await
        .unwrap();

    let (_, token_one) = blobs.read_value("one").await.unwrap();
    let outcome = blobs
        .conditional_write("two", Bytes::from_static(b"x"), &token_one)
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Conflict);
}

#[test]
fn version_tokens_compare_by_content() {
    assert_eq!(VersionToken::new("7"), VersionToken::new("7"));
    assert_ne!(VersionToken::new("7"), VersionToken::new("8"));
}
