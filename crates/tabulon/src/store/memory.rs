use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use core::future::Future;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{Error, Result};

use super::{
    BatchOperation, BlobStore, Continuation, MAX_BATCH_OPERATIONS, QuerySegment, TableEntity,
    TableQuery, TableStore, VersionToken, WriteOutcome,
};

/// Rows the table service returns per query segment before handing out a
/// continuation token.
const MAX_SEGMENT_RESULTS: usize = 1000;

type RowKeyPair = (String, String);

#[derive(Default)]
struct TableData {
    tables: HashMap<String, BTreeMap<RowKeyPair, Value>>,
}

/// In-process [`TableStore`] used by the test suites and for local
/// development.
///
/// Rows live in a `BTreeMap` keyed by (partition key, row key), which gives
/// queries the same ascending key order the real table service guarantees —
/// the ordering the snapshot store's reversed row keys rely on. Cloning the
/// store shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryTableStore {
    data: Arc<Mutex<TableData>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut BTreeMap<RowKeyPair, Value>) -> Result<R>,
    ) -> Result<R> {
        let mut data = self.data.lock();
        let rows = data
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::StorageUnavailable {
                context: format!("table '{table}' does not exist"),
            })?;
        f(rows)
    }
}

impl TableStore for MemoryTableStore {
    fn create_table_if_missing(&self, table: &str) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.data.lock().tables.entry(table.to_owned()).or_default();
            Ok(())
        }
    }

    fn retrieve<E: TableEntity>(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> impl Future<Output = Result<Option<E>>> + Send {
        async move {
            let key = (partition_key.to_owned(), row_key.to_owned());
            let value = self.with_table(table, |rows| Ok(rows.get(&key).cloned()))?;
            match value {
                None => Ok(None),
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
            }
        }
    }

    fn execute_batch<E: TableEntity>(
        &self,
        table: &str,
        batch: Vec<BatchOperation<E>>,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            validate_batch(&batch)?;

            self.with_table(table, |rows| {
                // The table service applies batches atomically: stage every
                // mutation, rejecting the whole batch before touching a row.
                let mut upserts = Vec::new();
                let mut deletes = Vec::new();

                for operation in batch {
                    match operation {
                        BatchOperation::Insert(entity) => {
                            let key = entity_key(&entity);
                            if rows.contains_key(&key) {
                                return Err(Error::EntityAlreadyExists {
                                    partition_key: key.0,
                                    row_key: key.1,
                                });
                            }
                            upserts.push((key, serde_json::to_value(&entity)?));
                        }
                        BatchOperation::InsertOrReplace(entity) => {
                            upserts.push((entity_key(&entity), serde_json::to_value(&entity)?));
                        }
                        BatchOperation::Delete {
                            partition_key,
                            row_key,
                        } => {
                            let key = (partition_key, row_key);
                            if !rows.contains_key(&key) {
                                return Err(Error::EntityNotFound {
                                    partition_key: key.0,
                                    row_key: key.1,
                                });
                            }
                            deletes.push(key);
                        }
                    }
                }

                for (key, value) in upserts {
                    rows.insert(key, value);
                }
                for key in deletes {
                    rows.remove(&key);
                }

                Ok(())
            })
        }
    }

    fn query_segmented<E: TableEntity>(
        &self,
        table: &str,
        query: &TableQuery,
        continuation: Option<Continuation>,
    ) -> impl Future<Output = Result<QuerySegment<E>>> + Send {
        async move {
            let mut matched = self.with_table(table, |rows| {
                let mut matched = Vec::new();
                for ((partition_key, row_key), value) in rows.iter() {
                    let keep = match &query.filter {
                        None => true,
                        Some(filter) => filter.matches(partition_key, row_key, value),
                    };
                    if keep {
                        matched.push(value.clone());
                    }
                }
                Ok(matched)
            })?;

            if let Some(take) = query.take {
                matched.truncate(take);
            }

            let start = continuation.map_or(0, |c| c.0 as usize).min(matched.len());
            let end = (start + MAX_SEGMENT_RESULTS).min(matched.len());
            let continuation = (end < matched.len()).then(|| Continuation(end as u64));

            let results = matched[start..end]
                .iter()
                .map(|value| Ok(serde_json::from_value(value.clone())?))
                .collect::<Result<Vec<E>>>()?;

            Ok(QuerySegment {
                results,
                continuation,
            })
        }
    }
}

fn entity_key<E: TableEntity>(entity: &E) -> RowKeyPair {
    (
        entity.partition_key().to_owned(),
        entity.row_key().to_owned(),
    )
}

fn operation_partition_key<E: TableEntity>(operation: &BatchOperation<E>) -> &str {
    match operation {
        BatchOperation::Insert(entity) | BatchOperation::InsertOrReplace(entity) => {
            entity.partition_key()
        }
        BatchOperation::Delete { partition_key, .. } => partition_key,
    }
}

fn validate_batch<E: TableEntity>(batch: &[BatchOperation<E>]) -> Result<()> {
    if batch.is_empty() {
        return Err(Error::InvalidBatch {
            reason: "batch contains no operations".to_owned(),
        });
    }

    if batch.len() > MAX_BATCH_OPERATIONS {
        return Err(Error::InvalidBatch {
            reason: format!(
                "batch contains {} operations, the maximum is {MAX_BATCH_OPERATIONS}",
                batch.len()
            ),
        });
    }

    let partition_key = operation_partition_key(&batch[0]);
    if batch
        .iter()
        .any(|operation| operation_partition_key(operation) != partition_key)
    {
        return Err(Error::InvalidBatch {
            reason: "a batch must target a single partition".to_owned(),
        });
    }

    Ok(())
}

#[derive(Default)]
struct BlobData {
    container_exists: bool,
    blobs: HashMap<String, (Bytes, u64)>,
    stamp: u64,
}

impl BlobData {
    fn next_stamp(&mut self) -> u64 {
        self.stamp += 1;
        self.stamp
    }
}

/// In-process [`BlobStore`] counterpart of [`MemoryTableStore`].
///
/// Version tokens are a monotonically increasing stamp per store; any write
/// replaces the blob's stamp, invalidating every previously issued token.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<Mutex<BlobData>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_blobs<R>(&self, f: impl FnOnce(&mut BlobData) -> Result<R>) -> Result<R> {
        let mut data = self.data.lock();
        if !data.container_exists {
            return Err(Error::StorageUnavailable {
                context: "blob container does not exist".to_owned(),
            });
        }
        f(&mut data)
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_container_if_missing(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.data.lock().container_exists = true;
            Ok(())
        }
    }

    fn create_if_missing(
        &self,
        name: &str,
        initial: Bytes,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.with_blobs(|data| {
                if !data.blobs.contains_key(name) {
                    let stamp = data.next_stamp();
                    data.blobs.insert(name.to_owned(), (initial, stamp));
                }
                Ok(())
            })
        }
    }

    fn read_value(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(Bytes, VersionToken)>> + Send {
        async move {
            self.with_blobs(|data| {
                data.blobs
                    .get(name)
                    .map(|(bytes, stamp)| (bytes.clone(), VersionToken::new(stamp.to_string())))
                    .ok_or_else(|| Error::StorageUnavailable {
                        context: format!("blob '{name}' does not exist"),
                    })
            })
        }
    }

    fn conditional_write(
        &self,
        name: &str,
        data: Bytes,
        expected: &VersionToken,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send {
        async move {
            self.with_blobs(|blobs| {
                let Some((_, stamp)) = blobs.blobs.get(name) else {
                    return Err(Error::StorageUnavailable {
                        context: format!("blob '{name}' does not exist"),
                    });
                };

                if stamp.to_string() != expected.as_str() {
                    return Ok(WriteOutcome::Conflict);
                }

                let stamp = blobs.next_stamp();
                blobs.blobs.insert(name.to_owned(), (data, stamp));
                Ok(WriteOutcome::Committed(VersionToken::new(stamp.to_string())))
            })
        }
    }
}
