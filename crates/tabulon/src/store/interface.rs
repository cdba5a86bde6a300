use core::future::Future;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{Result, store::Filter};

/// Maximum number of operations the table service accepts in one batch.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// A row that can be stored in and retrieved from a table.
///
/// Entities carry their own keys; everything else is an opaque property bag
/// produced by serde. Property names use the service's PascalCase convention.
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync {
    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
}

/// A query over one table: an optional filter plus an optional cap on the
/// total number of rows returned across all segments.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    pub filter: Option<Filter>,
    pub take: Option<usize>,
}

impl TableQuery {
    /// Matches every row in the table.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches rows satisfying `filter`.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            take: None,
        }
    }

    /// Caps the total number of rows returned.
    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }
}

/// Opaque marker for resuming a segmented query where the previous segment
/// stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation(pub(crate) u64);

/// One page of query results. `continuation` is `None` once the query is
/// drained.
#[derive(Debug)]
pub struct QuerySegment<E> {
    pub results: Vec<E>,
    pub continuation: Option<Continuation>,
}

/// A single operation inside a table batch.
#[derive(Debug, Clone)]
pub enum BatchOperation<E> {
    /// Insert a new row; fails if the row already exists.
    Insert(E),
    /// Insert a row or overwrite it if present.
    InsertOrReplace(E),
    /// Remove an existing row; fails if the row does not exist.
    Delete {
        partition_key: String,
        row_key: String,
    },
}

/// Capability set required from the backing table service.
///
/// Batches are atomic, limited to [`MAX_BATCH_OPERATIONS`] operations, and
/// must target a single partition. Segmented queries return rows ordered by
/// (partition key, row key) ascending; callers drain the continuation until it
/// is `None`.
pub trait TableStore: Send + Sync {
    /// Creates the table if it does not exist. Idempotent.
    fn create_table_if_missing(&self, table: &str) -> impl Future<Output = Result<()>> + Send;

    /// Point-reads one row. Returns `Ok(None)` when the row is absent.
    fn retrieve<E: TableEntity>(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> impl Future<Output = Result<Option<E>>> + Send;

    /// Applies a batch of operations atomically.
    fn execute_batch<E: TableEntity>(
        &self,
        table: &str,
        batch: Vec<BatchOperation<E>>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetches one segment of a query's results.
    fn query_segmented<E: TableEntity>(
        &self,
        table: &str,
        query: &TableQuery,
        continuation: Option<Continuation>,
    ) -> impl Future<Output = Result<QuerySegment<E>>> + Send;
}

/// Concurrency stamp attached to a stored blob value.
///
/// A token is only comparable against tokens of the same blob; its contents
/// are otherwise meaningless to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of a conditional blob write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was replaced; the new token supersedes the expected one.
    Committed(VersionToken),
    /// Another writer updated the blob first. Expected under contention, not
    /// an error.
    Conflict,
}

/// Capability set required from the backing blob service.
pub trait BlobStore: Send + Sync {
    /// Creates the system container if it does not exist. Idempotent.
    fn create_container_if_missing(&self) -> impl Future<Output = Result<()>> + Send;

    /// Creates the named blob with `initial` content unless it already
    /// exists. Racing creators are safe: the first writer wins and every
    /// other caller observes the existing blob untouched.
    fn create_if_missing(
        &self,
        name: &str,
        initial: Bytes,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Reads the blob's content together with its current version token.
    ///
    /// Fails with [`Error::StorageUnavailable`] when the blob (or its
    /// container) does not exist.
    ///
    /// [`Error::StorageUnavailable`]: crate::Error::StorageUnavailable
    fn read_value(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(Bytes, VersionToken)>> + Send;

    /// Replaces the blob's content if and only if its current version token
    /// equals `expected`. A mismatch reports [`WriteOutcome::Conflict`]; any
    /// other failure is an error.
    fn conditional_write(
        &self,
        name: &str,
        data: Bytes,
        expected: &VersionToken,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}
