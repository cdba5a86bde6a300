use core::future::Future;

use crate::Result;

/// A single shared 64-bit value guarded by optimistic concurrency.
///
/// This is the coordination point for sequence-number allocation across
/// processes: the value is only ever replaced by a conditional write stamped
/// with the version observed by the most recent read or write, so two writers
/// can never both believe they succeeded.
pub trait OptimisticSyncStore: Send + Sync {
    /// Creates the backing value with `0` if it does not exist and records
    /// its version token.
    ///
    /// Idempotent, and safe to race: the first creator wins and later callers
    /// observe the existing value.
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send;

    /// Reads the current value, refreshing the remembered version token so a
    /// following [`try_optimistic_write`] is conditioned on what was just
    /// observed.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::StorageUnavailable`] when the value has never been
    /// initialized, and [`Error::CorruptSequenceValue`] when it exists but is
    /// too short to hold a 64-bit integer.
    ///
    /// [`try_optimistic_write`]: OptimisticSyncStore::try_optimistic_write
    /// [`Error::StorageUnavailable`]: crate::Error::StorageUnavailable
    /// [`Error::CorruptSequenceValue`]: crate::Error::CorruptSequenceValue
    fn get_current(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Attempts to replace the value, conditioned on the version token from
    /// this instance's latest read or write.
    ///
    /// Returns `Ok(false)` — not an error — when another writer got there
    /// first; the caller is expected to re-read and retry. Hard failures
    /// (missing value, I/O) propagate as errors.
    fn try_optimistic_write(&self, value: u64) -> impl Future<Output = Result<bool>> + Send;
}
