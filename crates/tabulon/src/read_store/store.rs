use core::marker::PhantomData;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Result, StorageConfig,
    batch::group_by_running_length,
    store::{
        BatchOperation, Filter, MAX_BATCH_OPERATIONS, PARTITION_KEY, ROW_KEY, TableEntity,
        TableQuery, TableStore,
    },
};

use super::{ReadModel, ReadModelEnvelope, UpdateOutcome};

/// This is an assumed limitation based on the service documentation for the
/// maximum total length of a query URL.
const ASSUMED_MAX_QUERY_STRING_SIZE: usize = 4096;

/// The number of characters reserved for the `(PartitionKey eq '') and ()`
/// part of the filter.
const PARTITION_CONDITION_LENGTH: usize = 27;

/// The number of characters reserved for the `( or (RowKey eq ''))` part of
/// the filter, including the surrounding parentheses in the subquery nesting.
const ROW_KEY_CONDITION_LENGTH: usize = 20;

/// The service rejects filters nesting more conditions than this with a
/// "recursion depth exceeded" error. The value has been found by
/// trial-and-error.
const MAX_FILTER_CONDITIONS: usize = 100;

/// Row layout of the read model table. A single table stores all read
/// models; the model type name is the partition key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadModelRow {
    pub partition_key: String,
    pub row_key: String,
    pub read_model_type: String,
    pub version: u64,
    pub data: String,
}

impl TableEntity for ReadModelRow {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// Stores read models of type `M` in a table, one row per model instance.
pub struct TableReadModelStore<T, M> {
    table_store: T,
    table_name: String,
    _model: PhantomData<fn() -> M>,
}

impl<T: TableStore, M: ReadModel> TableReadModelStore<T, M> {
    pub fn new(config: &StorageConfig, table_store: T) -> Self {
        Self {
            table_store,
            table_name: config.read_store_table_name.clone(),
            _model: PhantomData,
        }
    }

    /// Creates the read model table if it does not exist. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.table_store
            .create_table_if_missing(&self.table_name)
            .await
    }

    /// Fetches one read model; an empty envelope when it does not exist.
    pub async fn get(&self, read_model_id: &str) -> Result<ReadModelEnvelope<M>> {
        match self.retrieve_single(read_model_id).await? {
            None => Ok(ReadModelEnvelope::empty(read_model_id)),
            Some(row) => {
                let envelope = envelope_from_row(row)?;
                trace!(
                    read_model = M::MODEL_NAME,
                    read_model_id,
                    version = envelope.version,
                    "found read model"
                );
                Ok(envelope)
            }
        }
    }

    /// Deletes one read model; a no-op when it does not exist.
    pub async fn delete(&self, read_model_id: &str) -> Result<()> {
        if self.retrieve_single(read_model_id).await?.is_none() {
            return Ok(());
        }

        let batch = vec![BatchOperation::<ReadModelRow>::Delete {
            partition_key: M::MODEL_NAME.to_owned(),
            row_key: read_model_id.to_owned(),
        }];
        self.table_store.execute_batch(&self.table_name, batch).await
    }

    /// Deletes every stored instance of this model type.
    pub async fn delete_all(&self) -> Result<()> {
        let query = TableQuery::filtered(Filter::equal(PARTITION_KEY, M::MODEL_NAME));

        loop {
            let segment = self
                .table_store
                .query_segmented::<ReadModelRow>(&self.table_name, &query, None)
                .await?;
            if segment.results.is_empty() {
                return Ok(());
            }

            for chunk in segment.results.chunks(MAX_BATCH_OPERATIONS) {
                let batch = chunk
                    .iter()
                    .map(|row| BatchOperation::<ReadModelRow>::Delete {
                        partition_key: row.partition_key.clone(),
                        row_key: row.row_key.clone(),
                    })
                    .collect::<Vec<_>>();
                let count = batch.len();
                self.table_store.execute_batch(&self.table_name, batch).await?;
                debug!(
                    count,
                    read_model = M::MODEL_NAME,
                    "deleted batch of read models"
                );
            }
        }
    }

    /// Applies `apply` to every read model named in `read_model_ids` and
    /// persists the outcomes.
    ///
    /// Existing rows are bulk-fetched first — grouped into as few queries as
    /// the backend's filter limits allow — then `apply` is called once per id
    /// in input order with the stored envelope (or an empty one). Modified
    /// and deleted models are written back in batches; unmodified ones cost
    /// nothing.
    pub async fn apply_updates<F>(&self, read_model_ids: &[String], mut apply: F) -> Result<()>
    where
        F: FnMut(&str, ReadModelEnvelope<M>) -> UpdateOutcome<M>,
    {
        if read_model_ids.is_empty() {
            return Ok(());
        }

        let rows = if let [only] = read_model_ids {
            self.retrieve_single(only).await?.into_iter().collect()
        } else {
            self.retrieve_multiple(read_model_ids).await?
        };

        let mut rows_by_id: HashMap<String, ReadModelRow> = rows
            .into_iter()
            .map(|row| (row.row_key.clone(), row))
            .collect();

        let mut operations = Vec::new();
        for read_model_id in read_model_ids {
            let envelope = match rows_by_id.remove(read_model_id) {
                Some(row) => envelope_from_row(row)?,
                None => ReadModelEnvelope::empty(read_model_id),
            };

            match apply(read_model_id.as_str(), envelope) {
                UpdateOutcome::Unmodified => {}
                UpdateOutcome::Updated {
                    read_model,
                    version,
                } => {
                    operations.push(BatchOperation::InsertOrReplace(ReadModelRow {
                        partition_key: M::MODEL_NAME.to_owned(),
                        row_key: read_model_id.clone(),
                        read_model_type: M::MODEL_NAME.to_owned(),
                        version,
                        data: serde_json::to_string_pretty(&read_model)?,
                    }));
                }
                UpdateOutcome::Deleted => {
                    operations.push(BatchOperation::Delete {
                        partition_key: M::MODEL_NAME.to_owned(),
                        row_key: read_model_id.clone(),
                    });
                }
            }
        }

        for chunk in operations.chunks(MAX_BATCH_OPERATIONS) {
            self.table_store
                .execute_batch(&self.table_name, chunk.to_vec())
                .await?;
        }

        Ok(())
    }

    async fn retrieve_single(&self, read_model_id: &str) -> Result<Option<ReadModelRow>> {
        let row: Option<ReadModelRow> = self
            .table_store
            .retrieve(&self.table_name, M::MODEL_NAME, read_model_id)
            .await?;

        match row {
            None => {
                trace!(
                    read_model = M::MODEL_NAME,
                    read_model_id,
                    "read model not found"
                );
                Ok(None)
            }
            Some(row) if row.data.trim().is_empty() => {
                trace!(
                    read_model = M::MODEL_NAME,
                    read_model_id,
                    "found read model without any data"
                );
                Ok(None)
            }
            Some(row) => Ok(Some(row)),
        }
    }

    /// Retrieves many distinct rows from the model's partition.
    ///
    /// Each retrieval is a network request, so for better performance as many
    /// ids as possible are folded into a single request: the ids are
    /// run-length grouped by the rendered length of their filter condition,
    /// and each group becomes one OR-combined query. Note that the estimate
    /// does not account for URL-encoding of the filter string — the condition
    /// count is usually the binding limit anyway, unless the key values are
    /// very short.
    async fn retrieve_multiple(&self, read_model_ids: &[String]) -> Result<Vec<ReadModelRow>> {
        let partition_filter = Filter::equal(PARTITION_KEY, M::MODEL_NAME);
        let groups = group_by_running_length(
            read_model_ids.iter().map(String::as_str),
            query_filter_max_length(M::MODEL_NAME),
            MAX_FILTER_CONDITIONS,
            |id| record_filter_length(id),
        );

        let mut rows = Vec::new();
        for group in groups {
            let Some(row_key_filter) = group
                .items
                .into_iter()
                .map(|id| Filter::equal(ROW_KEY, id))
                .reduce(Filter::or)
            else {
                continue;
            };

            let query = TableQuery::filtered(partition_filter.clone().and(row_key_filter));
            let mut continuation = None;
            loop {
                let segment = self
                    .table_store
                    .query_segmented::<ReadModelRow>(&self.table_name, &query, continuation)
                    .await?;
                rows.extend(segment.results);
                continuation = segment.continuation;
                if continuation.is_none() {
                    break;
                }
            }
        }

        Ok(rows)
    }
}

fn envelope_from_row<M: ReadModel>(row: ReadModelRow) -> Result<ReadModelEnvelope<M>> {
    let read_model: M = serde_json::from_str(&row.data)?;
    Ok(ReadModelEnvelope::with(
        row.row_key,
        read_model,
        Some(row.version),
    ))
}

fn query_filter_max_length(partition_key: &str) -> usize {
    ASSUMED_MAX_QUERY_STRING_SIZE
        .saturating_sub(PARTITION_CONDITION_LENGTH)
        .saturating_sub(partition_key.len())
}

fn record_filter_length(read_model_id: &str) -> usize {
    ROW_KEY_CONDITION_LENGTH + read_model_id.len()
}
