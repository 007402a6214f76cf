use thiserror::Error;
use timeline::{ClipId, TimelineError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("mutation {index} on clip {clip_id} failed: {source}")]
    MutationFailed {
        index: usize,
        clip_id: ClipId,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The innermost error, looking through `MutationFailed` wrappers.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::MutationFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
