//! Error types shared by the tokenizer, index, builder and store.

use std::io;

use thiserror::Error;

use crate::index::DocId;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

/// Everything that can go wrong inside the engine.
///
/// Validation variants describe bad caller input and are raised before any
/// state is touched. State variants describe an index used in the wrong phase
/// of its lifecycle. The remaining variants wrap I/O from the document source,
/// the store and the artifact on disk.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("mode must be and|or, got {0:?}")]
    InvalidMode(String),

    #[error("limit must be a non-negative integer, got {0:?}")]
    InvalidLimit(String),

    #[error("batch size must be a positive integer")]
    InvalidBatchSize,

    #[error("malformed document id {0:?}")]
    MalformedDocId(String),

    /// The source returned an id that does not advance the keyset cursor.
    #[error("document source returned id {got} after {previous}; ids must be strictly ascending")]
    NonMonotonicId { previous: DocId, got: DocId },

    #[error("document source returned {got} documents for a page of {limit}")]
    OversizedPage { limit: usize, got: usize },

    #[error("term frequency for {term:?} must be positive")]
    InvalidTermFrequency { term: String },

    #[error("document {0} was already added to the index")]
    DuplicateDocument(DocId),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("no index has been built or loaded")]
    IndexNotLoaded,

    #[error("index is finalized and can no longer be modified")]
    IndexFinalized,

    /// A page fetch failed. `after_id` is the last id applied to the index,
    /// which is where a restarted build would resume.
    #[error("failed to fetch documents after id {after_id}: {source}")]
    Fetch {
        after_id: DocId,
        #[source]
        source: Box<SearchError>,
    },

    #[error("document source error: {0}")]
    Source(String),

    #[error("index build cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document store error: {0}")]
    Store(#[from] sled::Error),

    #[error("document encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("timestamp error: {0}")]
    Time(String),
}

impl SearchError {
    /// True for errors caused by caller input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMode(_)
                | Self::InvalidLimit(_)
                | Self::InvalidBatchSize
                | Self::MalformedDocId(_)
                | Self::NonMonotonicId { .. }
                | Self::OversizedPage { .. }
                | Self::InvalidTermFrequency { .. }
                | Self::DuplicateDocument(_)
                | Self::InvalidDocument(_)
        )
    }
}
