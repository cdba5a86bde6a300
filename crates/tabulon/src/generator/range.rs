use core::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{Error, Result, StorageConfig, sync::OptimisticSyncStore};

/// The half-open range of IDs an instance may issue without touching the
/// shared counter. Exhausted when `last_issued == upper_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdRange {
    last_issued: u64,
    upper_limit: u64,
}

/// Generates unique IDs across environments, processes, and tasks by
/// reserving ranges from a shared [`OptimisticSyncStore`].
///
/// Contention on the store is amortized: one successful conditional write
/// reserves `range_size` IDs, after which [`next_id`] is pure arithmetic
/// under an in-process lock. Two instances can never be granted overlapping
/// ranges, because each reservation must win a conditional write against the
/// shared counter.
///
/// IDs left unissued when the process stops are forfeited; the sequence is
/// unique and strictly increasing per instance, not dense.
///
/// [`next_id`]: crate::IdGenerator::next_id
pub struct RangeIdGenerator<S> {
    sync_store: S,
    range_size: u64,
    max_retries: u32,
    range: Mutex<IdRange>,
}

impl<S: OptimisticSyncStore> RangeIdGenerator<S> {
    /// Creates a generator over `sync_store` using the range size and retry
    /// count from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the configured range size
    /// or retry count is below 1.
    pub fn new(config: &StorageConfig, sync_store: S) -> Result<Self> {
        if config.sequence_number_range_size < 1 {
            return Err(Error::InvalidConfiguration {
                reason: "sequence_number_range_size must be at least 1".to_owned(),
            });
        }
        if config.sequence_number_retries < 1 {
            return Err(Error::InvalidConfiguration {
                reason: "sequence_number_retries must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            sync_store,
            range_size: config.sequence_number_range_size,
            max_retries: config.sequence_number_retries,
            range: Mutex::new(IdRange {
                last_issued: 0,
                upper_limit: 0,
            }),
        })
    }

    /// Reserves a fresh range from the sync store.
    ///
    /// The new range is returned rather than written into `self.range` so
    /// that neither a lost retry budget nor a cancelled future can leave a
    /// partially adopted range behind.
    async fn replenish(&self) -> Result<IdRange> {
        // max_retries + 1 because the first run isn't a "re"try.
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let current = self.sync_store.get_current().await?;
            let upper_limit = current + self.range_size;

            if self.sync_store.try_optimistic_write(upper_limit).await? {
                trace!(current, upper_limit, "reserved new ID range");
                return Ok(IdRange {
                    last_issued: current,
                    upper_limit,
                });
            }

            debug!(attempt, upper_limit, "ID range reservation lost the race");
        }

        Err(Error::AllocationExhausted { attempts })
    }
}

impl<S: OptimisticSyncStore> crate::IdGenerator for RangeIdGenerator<S> {
    fn next_id(&self) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let mut range = self.range.lock().await;

            if range.last_issued == range.upper_limit {
                *range = self.replenish().await?;
            }

            range.last_issued += 1;
            Ok(range.last_issued)
        }
    }
}
