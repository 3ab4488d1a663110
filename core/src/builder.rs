//! Batched index build over a keyset-paginated document source.

use crate::error::{Result, SearchError};
use crate::index::{DocId, InvertedIndex};
use crate::persist::write_index_file;
use crate::tokenizer::{term_frequencies, tokenize, TokenizeOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: DocId,
    pub content: String,
}

/// A store that can page through documents by ascending id.
pub trait DocumentSource {
    /// Up to `limit` documents with `id > after_id`, ascending by id.
    /// An empty page means there is nothing left.
    fn fetch_page(&self, after_id: DocId, limit: usize) -> Result<Vec<SourceDocument>>;
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
    fn fetch_page(&self, after_id: DocId, limit: usize) -> Result<Vec<SourceDocument>> {
        (**self).fetch_page(after_id, limit)
    }
}

/// Parse an externally supplied identifier. Ids are positive integers.
pub fn parse_doc_id(raw: &str) -> Result<DocId> {
    match raw.trim().parse::<DocId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(SearchError::MalformedDocId(raw.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub batch_size: usize,
    /// Where to write the serialized index once the build completes.
    pub artifact_path: Option<PathBuf>,
    /// Resume point; only documents with a greater id are read.
    pub start_after: DocId,
    /// Checked between batches.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, artifact_path: None, start_after: 0, cancel: None }
    }
}

impl BuildOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Build a finalized index from every document in `source`.
///
/// Pages are requested strictly in order, each after the last id applied. Any
/// error aborts the build and the partial index is dropped; nothing is written
/// to `artifact_path` unless the whole source was consumed.
pub fn build<S>(source: &S, options: &BuildOptions) -> Result<InvertedIndex>
where
    S: DocumentSource + ?Sized,
{
    if options.batch_size == 0 {
        return Err(SearchError::InvalidBatchSize);
    }

    let tokenize_options = TokenizeOptions::default();
    let mut index = InvertedIndex::new();
    let mut last_seen: DocId = options.start_after;
    let mut batches = 0usize;

    loop {
        if options.cancelled() {
            tracing::warn!(last_seen, batches, "index build cancelled");
            return Err(SearchError::Cancelled);
        }

        let page = source
            .fetch_page(last_seen, options.batch_size)
            .map_err(|e| {
                tracing::error!(after_id = last_seen, error = %e, "index build aborted");
                SearchError::Fetch { after_id: last_seen, source: Box::new(e) }
            })?;
        if page.is_empty() {
            break;
        }
        if page.len() > options.batch_size {
            return Err(SearchError::OversizedPage { limit: options.batch_size, got: page.len() });
        }

        for doc in &page {
            if doc.id <= last_seen {
                return Err(SearchError::NonMonotonicId { previous: last_seen, got: doc.id });
            }
            let tokens = tokenize(doc.content.as_str(), &tokenize_options);
            index.add_document(doc.id, &term_frequencies(tokens))?;
            last_seen = doc.id;
        }
        batches += 1;
        tracing::info!(batch = batches, docs = page.len(), last_seen, "indexed batch");
    }

    index.finalize();
    tracing::info!(num_docs = index.doc_count, num_terms = index.term_count(), batches, "index build complete");

    if let Some(path) = &options.artifact_path {
        write_index_file(path, &index)?;
        tracing::info!(path = %path.display(), "index artifact written");
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_doc_ids() {
        assert_eq!(parse_doc_id("42").unwrap(), 42);
        assert_eq!(parse_doc_id(" 7 ").unwrap(), 7);
        for bad in ["0", "-3", "abc", "", "1.5"] {
            assert!(matches!(parse_doc_id(bad), Err(SearchError::MalformedDocId(_))), "{bad}");
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        struct Never;
        impl DocumentSource for Never {
            fn fetch_page(&self, _: DocId, _: usize) -> Result<Vec<SourceDocument>> {
                panic!("should not be called")
            }
        }
        let err = build(&Never, &BuildOptions::default().with_batch_size(0)).unwrap_err();
        assert!(matches!(err, SearchError::InvalidBatchSize));
    }
}
