use core::future::Future;

use crate::Result;

/// A source of unique 64-bit IDs.
///
/// IDs handed out by one instance are strictly increasing in call order and
/// never include `0`. Gaps are allowed: implementations may discard part of a
/// reserved range, for example when the process restarts.
pub trait IdGenerator: Send + Sync {
    /// Fetches the next available unique ID.
    fn next_id(&self) -> impl Future<Output = Result<u64>> + Send;
}
