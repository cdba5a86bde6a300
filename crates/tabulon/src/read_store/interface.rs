use serde::{Serialize, de::DeserializeOwned};

/// A read model persisted by [`TableReadModelStore`].
///
/// All models of one type share a table partition named by `MODEL_NAME`, so
/// the name must be unique per model type and stable across deployments.
///
/// [`TableReadModelStore`]: crate::TableReadModelStore
pub trait ReadModel: Serialize + DeserializeOwned + Send + Sync {
    const MODEL_NAME: &'static str;
}

/// A read model together with its identity and version, or the absence of
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadModelEnvelope<M> {
    pub read_model_id: String,
    pub read_model: Option<M>,
    pub version: Option<u64>,
}

impl<M> ReadModelEnvelope<M> {
    /// The envelope of a model that does not exist (yet).
    pub fn empty(read_model_id: impl Into<String>) -> Self {
        Self {
            read_model_id: read_model_id.into(),
            read_model: None,
            version: None,
        }
    }

    pub fn with(read_model_id: impl Into<String>, read_model: M, version: Option<u64>) -> Self {
        Self {
            read_model_id: read_model_id.into(),
            read_model: Some(read_model),
            version,
        }
    }
}

/// Decision returned by the update closure for one read model.
#[derive(Debug)]
pub enum UpdateOutcome<M> {
    /// Nothing changed; the stored row is left alone.
    Unmodified,
    /// Persist `read_model` under `version`, replacing any stored row.
    Updated { read_model: M, version: u64 },
    /// Remove the stored row.
    Deleted,
}
