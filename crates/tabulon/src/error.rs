pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the storage adapter.
///
/// Conditional-write conflicts are deliberately **not** represented here: a
/// lost race is an expected outcome, reported as `Ok(false)` by
/// [`OptimisticSyncStore::try_optimistic_write`] and retried internally by the
/// ID generator. Only exhausted retries surface, as
/// [`Error::AllocationExhausted`].
///
/// [`OptimisticSyncStore::try_optimistic_write`]: crate::OptimisticSyncStore::try_optimistic_write
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The backing store (or a required table, container, or blob) could not
    /// be reached or does not exist.
    #[error("storage unavailable: {context}")]
    StorageUnavailable { context: String },

    /// The stored sequence value exists but cannot be interpreted as a 64-bit
    /// integer.
    #[error("stored sequence value is corrupt: expected at least 8 bytes, found {len}")]
    CorruptSequenceValue { len: usize },

    /// Reserving a sequence-number range kept losing the conditional write
    /// until every attempt was spent. The generator's in-memory state is left
    /// untouched, so a later call may succeed.
    #[error("sequence allocation failed after {attempts} optimistic write attempts")]
    AllocationExhausted { attempts: u32 },

    /// A configuration value was rejected at construction time.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A plain insert targeted a row that already exists.
    ///
    /// For the event store this doubles as the aggregate-level optimistic
    /// concurrency signal: committing an aggregate sequence number twice is a
    /// conflicting write, not an I/O failure.
    #[error("entity '{partition_key}/{row_key}' already exists")]
    EntityAlreadyExists {
        partition_key: String,
        row_key: String,
    },

    /// A delete targeted a row that does not exist.
    #[error("entity '{partition_key}/{row_key}' does not exist")]
    EntityNotFound {
        partition_key: String,
        row_key: String,
    },

    /// A batch violated the table service's rules (size, partition scope).
    #[error("batch rejected: {reason}")]
    InvalidBatch { reason: String },

    /// An entity or read model failed to (de)serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
