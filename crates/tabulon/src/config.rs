use crate::{Error, Result};

/// Settings shared by every store in the adapter.
///
/// All values have workable defaults; [`StorageConfig::validate`] is called by
/// the components that care (notably [`RangeIdGenerator::new`]) so that bad
/// values are rejected at construction time rather than on the first call.
///
/// [`RangeIdGenerator::new`]: crate::RangeIdGenerator::new
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Container holding system-level values such as the global sequence
    /// counter blob.
    pub system_container_name: String,
    /// Name of the blob holding the global sequence counter.
    pub sequence_number_blob_name: String,
    /// How many sequence numbers one replenishment reserves. A size of `1`
    /// degenerates to one round trip per ID.
    pub sequence_number_range_size: u64,
    /// How many times a lost conditional write is retried before a
    /// replenishment gives up.
    pub sequence_number_retries: u32,
    pub event_store_table_name: String,
    pub read_store_table_name: String,
    pub snapshot_store_table_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            system_container_name: "tabulon-system-params".to_owned(),
            sequence_number_blob_name: "GlobalSequenceNumber".to_owned(),
            sequence_number_range_size: 1000,
            sequence_number_retries: 25,
            event_store_table_name: "TabulonEvents".to_owned(),
            read_store_table_name: "TabulonReadModels".to_owned(),
            snapshot_store_table_name: "TabulonSnapshots".to_owned(),
        }
    }
}

impl StorageConfig {
    /// Rejects values that would only fail later, at call time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if any name is blank, or if the
    /// range size or retry count is below 1.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("system_container_name", &self.system_container_name),
            ("sequence_number_blob_name", &self.sequence_number_blob_name),
            ("event_store_table_name", &self.event_store_table_name),
            ("read_store_table_name", &self.read_store_table_name),
            ("snapshot_store_table_name", &self.snapshot_store_table_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfiguration {
                    reason: format!("{name} must not be blank"),
                });
            }
        }

        if self.sequence_number_range_size < 1 {
            return Err(Error::InvalidConfiguration {
                reason: "sequence_number_range_size must be at least 1".to_owned(),
            });
        }

        if self.sequence_number_retries < 1 {
            return Err(Error::InvalidConfiguration {
                reason: "sequence_number_retries must be at least 1".to_owned(),
            });
        }

        Ok(())
    }
}
