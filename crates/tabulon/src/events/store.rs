use tracing::{debug, trace};

use crate::{
    IdGenerator, Result, StorageConfig,
    store::{
        BatchOperation, Filter, MAX_BATCH_OPERATIONS, PARTITION_KEY, ROW_KEY, TableQuery,
        TableStore,
    },
};

use super::types::{
    CommittedEvent, CommittedEventsPage, EventRow, GLOBAL_SEQUENCE_NUMBER, GlobalPosition,
    SerializedEvent,
};

/// Persists all events in a single table.
///
/// Each committed event receives a global sequence number from the ID
/// generator, giving the whole store a total order that
/// [`load_all_events`](TableEventStore::load_all_events) pages through.
pub struct TableEventStore<T, G> {
    table_store: T,
    id_generator: G,
    table_name: String,
}

impl<T: TableStore, G: IdGenerator> TableEventStore<T, G> {
    pub fn new(config: &StorageConfig, table_store: T, id_generator: G) -> Self {
        Self {
            table_store,
            id_generator,
            table_name: config.event_store_table_name.clone(),
        }
    }

    /// Creates the event table if it does not exist. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.table_store
            .create_table_if_missing(&self.table_name)
            .await
    }

    /// Commits `serialized_events` for the aggregate identified by
    /// `aggregate_id`, in order.
    ///
    /// Inserts are plain (never overwriting), so committing an aggregate
    /// sequence number that already exists fails with
    /// [`Error::EntityAlreadyExists`] — the signal that another writer got to
    /// this aggregate first. Large commits are split into batches of at most
    /// [`MAX_BATCH_OPERATIONS`] rows.
    ///
    /// [`Error::EntityAlreadyExists`]: crate::Error::EntityAlreadyExists
    pub async fn commit_events(
        &self,
        aggregate_id: &str,
        serialized_events: &[SerializedEvent],
    ) -> Result<Vec<CommittedEvent>> {
        if serialized_events.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(serialized_events.len());
        for event in serialized_events {
            let global_sequence_number = self.id_generator.next_id().await?;
            rows.push(EventRow {
                partition_key: aggregate_id.to_owned(),
                row_key: padded_sequence_number(event.aggregate_sequence_number),
                event_name: event.event_name.clone(),
                aggregate_name: event.aggregate_name.clone(),
                aggregate_id: aggregate_id.to_owned(),
                aggregate_sequence_number: event.aggregate_sequence_number,
                global_sequence_number,
                data: event.data.clone(),
                metadata: event.metadata.clone(),
                batch_id: event.batch_id,
            });
        }

        debug!(
            count = rows.len(),
            aggregate_id, "committing events to the event store"
        );

        for chunk in rows.chunks(MAX_BATCH_OPERATIONS) {
            let batch = chunk
                .iter()
                .cloned()
                .map(BatchOperation::Insert)
                .collect::<Vec<_>>();
            self.table_store.execute_batch(&self.table_name, batch).await?;
        }

        Ok(rows.into_iter().map(EventRow::into_committed).collect())
    }

    /// Loads the aggregate's events with sequence numbers at or above
    /// `from_sequence_number`, ascending.
    pub async fn load_events(
        &self,
        aggregate_id: &str,
        from_sequence_number: u32,
    ) -> Result<Vec<CommittedEvent>> {
        let filter = Filter::equal(PARTITION_KEY, aggregate_id).and(
            Filter::greater_than_or_equal(
                ROW_KEY,
                padded_sequence_number(from_sequence_number),
            ),
        );
        let query = TableQuery::filtered(filter);

        let mut rows = self.drain_query(&query, None).await?;
        rows.sort_by_key(|row| row.aggregate_sequence_number);

        Ok(rows.into_iter().map(EventRow::into_committed).collect())
    }

    /// Loads one page of the global event stream starting at `position`.
    pub async fn load_all_events(
        &self,
        position: GlobalPosition,
        page_size: usize,
    ) -> Result<CommittedEventsPage> {
        let query = match position.sequence_number() {
            None => TableQuery::all().take(page_size),
            Some(start) => {
                TableQuery::filtered(Filter::greater_than_or_equal(GLOBAL_SEQUENCE_NUMBER, start))
                    .take(page_size)
            }
        };

        let mut rows = self.drain_query(&query, Some(page_size)).await?;
        rows.sort_by_key(|row| row.global_sequence_number);
        rows.truncate(page_size);

        let next_position = rows
            .iter()
            .map(|row| row.global_sequence_number)
            .max()
            .map_or(position, |last| {
                GlobalPosition::from_sequence_number(last + 1)
            });

        Ok(CommittedEventsPage {
            next_position,
            events: rows.into_iter().map(EventRow::into_committed).collect(),
        })
    }

    /// Deletes every event of the aggregate identified by `aggregate_id`.
    pub async fn delete_events(&self, aggregate_id: &str) -> Result<()> {
        let query = TableQuery::filtered(Filter::equal(PARTITION_KEY, aggregate_id));

        // Re-query from the top after each round of deletes instead of
        // chasing continuation tokens across a shrinking result set.
        loop {
            let segment = self
                .table_store
                .query_segmented::<EventRow>(&self.table_name, &query, None)
                .await?;
            if segment.results.is_empty() {
                return Ok(());
            }

            for chunk in segment.results.chunks(MAX_BATCH_OPERATIONS) {
                let batch = chunk
                    .iter()
                    .map(|row| BatchOperation::<EventRow>::Delete {
                        partition_key: row.partition_key.clone(),
                        row_key: row.row_key.clone(),
                    })
                    .collect::<Vec<_>>();
                let count = batch.len();
                self.table_store.execute_batch(&self.table_name, batch).await?;
                trace!(count, aggregate_id, "deleted batch of events");
            }
        }
    }

    /// Runs `query` to completion, draining every continuation.
    ///
    /// `at_most` stops fetching further segments once enough rows have
    /// accumulated; the backend's own `take` already caps totals, this only
    /// short-circuits the paging loop.
    async fn drain_query(
        &self,
        query: &TableQuery,
        at_most: Option<usize>,
    ) -> Result<Vec<EventRow>> {
        let mut rows = Vec::new();
        let mut continuation = None;

        loop {
            let segment = self
                .table_store
                .query_segmented::<EventRow>(&self.table_name, query, continuation)
                .await?;
            rows.extend(segment.results);
            continuation = segment.continuation;

            let done = at_most.is_some_and(|limit| rows.len() >= limit);
            if continuation.is_none() || done {
                return Ok(rows);
            }
        }
    }
}

/// The row key is a `u32`, and its maximum is ten digits long. To enable
/// efficient sorting and querying by range, pad with leading zeros.
fn padded_sequence_number(sequence_number: u32) -> String {
    format!("{sequence_number:010}")
}
