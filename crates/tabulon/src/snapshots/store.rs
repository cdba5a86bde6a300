use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    Result, StorageConfig,
    store::{
        BatchOperation, Filter, MAX_BATCH_OPERATIONS, PARTITION_KEY, TableEntity, TableQuery,
        TableStore,
    },
};

/// A snapshot serialized by the host framework, ready to be stored.
#[derive(Debug, Clone)]
pub struct SerializedSnapshot {
    pub aggregate_sequence_number: u32,
    pub data: String,
    pub metadata: String,
}

/// A snapshot as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedSnapshot {
    pub data: String,
    pub metadata: String,
}

/// Row layout of the snapshot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotRow {
    pub partition_key: String,
    pub row_key: String,
    pub aggregate_name: String,
    pub aggregate_id: String,
    pub aggregate_sequence_number: u32,
    pub data: String,
    pub metadata: String,
}

impl TableEntity for SnapshotRow {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// Persists aggregate snapshots in a single table.
///
/// Row keys are constructed so the *latest* snapshot sorts first within its
/// partition, making "get the newest" a take-1 query instead of a scan.
pub struct TableSnapshotStore<T> {
    table_store: T,
    table_name: String,
}

impl<T: TableStore> TableSnapshotStore<T> {
    pub fn new(config: &StorageConfig, table_store: T) -> Self {
        Self {
            table_store,
            table_name: config.snapshot_store_table_name.clone(),
        }
    }

    /// Creates the snapshot table if it does not exist. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.table_store
            .create_table_if_missing(&self.table_name)
            .await
    }

    /// Fetches the latest snapshot of one aggregate, if any.
    pub async fn get_snapshot(
        &self,
        aggregate_name: &str,
        aggregate_id: &str,
    ) -> Result<Option<CommittedSnapshot>> {
        let partition_key = partition_key(aggregate_name, aggregate_id);
        // The row keys sort naturally descending by sequence number, so the
        // first entity is the latest snapshot.
        let query = TableQuery::filtered(Filter::equal(PARTITION_KEY, partition_key)).take(1);

        let segment = self
            .table_store
            .query_segmented::<SnapshotRow>(&self.table_name, &query, None)
            .await?;

        Ok(segment.results.into_iter().next().map(|row| CommittedSnapshot {
            data: row.data,
            metadata: row.metadata,
        }))
    }

    /// Stores a snapshot, replacing any earlier snapshot with the same
    /// sequence number.
    pub async fn set_snapshot(
        &self,
        aggregate_name: &str,
        aggregate_id: &str,
        snapshot: SerializedSnapshot,
    ) -> Result<()> {
        let row = SnapshotRow {
            partition_key: partition_key(aggregate_name, aggregate_id),
            row_key: reversed_row_key(snapshot.aggregate_sequence_number),
            aggregate_name: aggregate_name.to_owned(),
            aggregate_id: aggregate_id.to_owned(),
            aggregate_sequence_number: snapshot.aggregate_sequence_number,
            data: snapshot.data,
            metadata: snapshot.metadata,
        };

        self.table_store
            .execute_batch(&self.table_name, vec![BatchOperation::InsertOrReplace(row)])
            .await
    }

    /// Deletes every snapshot of one aggregate.
    pub async fn purge_snapshots(
        &self,
        aggregate_name: &str,
        aggregate_id: &str,
    ) -> Result<()> {
        let partition_key = partition_key(aggregate_name, aggregate_id);
        let query = TableQuery::filtered(Filter::equal(PARTITION_KEY, partition_key.clone()));

        loop {
            let segment = self
                .table_store
                .query_segmented::<SnapshotRow>(&self.table_name, &query, None)
                .await?;
            if segment.results.is_empty() {
                return Ok(());
            }

            for chunk in segment.results.chunks(MAX_BATCH_OPERATIONS) {
                let batch = chunk
                    .iter()
                    .map(|row| BatchOperation::<SnapshotRow>::Delete {
                        partition_key: row.partition_key.clone(),
                        row_key: row.row_key.clone(),
                    })
                    .collect::<Vec<_>>();
                let count = batch.len();
                self.table_store.execute_batch(&self.table_name, batch).await?;
                trace!(count, partition_key = %partition_key, "deleted batch of snapshots");
            }
        }
    }
}

/// The partition key combines the aggregate's type and identity, separated by
/// an underscore. Harder for humans to read, but it keeps every aggregate's
/// snapshots in one partition for efficient querying.
fn partition_key(aggregate_name: &str, aggregate_id: &str) -> String {
    format!("{aggregate_name}_{aggregate_id}")
}

/// The row key is the aggregate sequence number in reverse order. The table
/// sorts row keys ascending, so a key that decreases as the sequence number
/// grows puts the latest snapshot first.
//
// WARNING: Changing this logic will make get_snapshot stop working!
fn reversed_row_key(aggregate_sequence_number: u32) -> String {
    format!("{:010}", u32::MAX - aggregate_sequence_number)
}
