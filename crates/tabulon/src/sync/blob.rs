use core::future::Future;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::trace;

use crate::{
    Error, Result,
    store::{BlobStore, VersionToken, WriteOutcome},
};

#[derive(Debug, Default)]
struct TokenState {
    initialized: bool,
    version: Option<VersionToken>,
}

/// Stores a single 64-bit value in a blob and updates it with optimistic
/// concurrency.
///
/// The value is the blob's first 8 bytes, little-endian. The instance
/// remembers the version token of its latest read or successful write and
/// conditions every write on it; a write that loses the race reports `false`
/// so the caller can re-read and retry.
pub struct BlobOptimisticSyncStore<B> {
    blob_store: B,
    blob_name: String,
    state: Mutex<TokenState>,
}

impl<B: BlobStore> BlobOptimisticSyncStore<B> {
    pub fn new(blob_store: B, blob_name: impl Into<String>) -> Self {
        Self {
            blob_store,
            blob_name: blob_name.into(),
            state: Mutex::new(TokenState::default()),
        }
    }
}

impl<B: BlobStore> super::OptimisticSyncStore for BlobOptimisticSyncStore<B> {
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            let mut state = self.state.lock().await;
            if state.initialized {
                return Ok(());
            }

            self.blob_store.create_container_if_missing().await?;
            self.blob_store
                .create_if_missing(&self.blob_name, value_bytes(0))
                .await?;

            let (_, version) = self.blob_store.read_value(&self.blob_name).await?;
            state.version = Some(version);
            state.initialized = true;

            trace!(blob = %self.blob_name, "sync store initialized");
            Ok(())
        }
    }

    fn get_current(&self) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let (bytes, version) = self.blob_store.read_value(&self.blob_name).await?;
            if bytes.len() < size_of::<u64>() {
                return Err(Error::CorruptSequenceValue { len: bytes.len() });
            }

            let mut buffer = [0u8; size_of::<u64>()];
            buffer.copy_from_slice(&bytes[..size_of::<u64>()]);

            self.state.lock().await.version = Some(version);
            Ok(u64::from_le_bytes(buffer))
        }
    }

    fn try_optimistic_write(&self, value: u64) -> impl Future<Output = Result<bool>> + Send {
        async move {
            let expected = self.state.lock().await.version.clone().ok_or_else(|| {
                Error::StorageUnavailable {
                    context: format!(
                        "sync store for blob '{}' has not observed a version token; read or initialize first",
                        self.blob_name
                    ),
                }
            })?;

            match self
                .blob_store
                .conditional_write(&self.blob_name, value_bytes(value), &expected)
                .await?
            {
                WriteOutcome::Committed(version) => {
                    self.state.lock().await.version = Some(version);
                    Ok(true)
                }
                WriteOutcome::Conflict => Ok(false),
            }
        }
    }
}

fn value_bytes(value: u64) -> Bytes {
    Bytes::copy_from_slice(&value.to_le_bytes())
}
