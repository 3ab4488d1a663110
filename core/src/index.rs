use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub type DocId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Term -> postings. Postings are appended in insertion order and sorted by
/// doc id once in [`InvertedIndex::finalize`].
///
/// Serialized form is `{"docCount": n, "postings": {term: [{"docId", "tf"}]}}`
/// with terms in lexicographic order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvertedIndex {
    pub doc_count: u64,
    pub postings: BTreeMap<String, Vec<Posting>>,
    #[serde(skip)]
    finalized: bool,
    #[serde(skip)]
    seen: HashSet<DocId>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Record one document's term frequencies.
    ///
    /// The whole map is checked before anything is appended, so a rejected
    /// document leaves the index untouched.
    pub fn add_document(&mut self, doc_id: DocId, tf_by_term: &HashMap<String, u32>) -> Result<()> {
        if self.finalized {
            return Err(SearchError::IndexFinalized);
        }
        if self.seen.contains(&doc_id) {
            return Err(SearchError::DuplicateDocument(doc_id));
        }
        if let Some((term, _)) = tf_by_term.iter().find(|(_, tf)| **tf == 0) {
            return Err(SearchError::InvalidTermFrequency { term: term.clone() });
        }

        for (term, &tf) in tf_by_term {
            // get_mut first so existing terms don't pay for a key allocation
            match self.postings.get_mut(term.as_str()) {
                Some(list) => list.push(Posting { doc_id, tf }),
                None => {
                    self.postings.insert(term.clone(), vec![Posting { doc_id, tf }]);
                }
            }
        }
        self.seen.insert(doc_id);
        self.doc_count += 1;
        Ok(())
    }

    /// Sort every postings list by doc id and freeze the index. Safe to call twice.
    pub fn finalize(&mut self) {
        for list in self.postings.values_mut() {
            list.sort_by_key(|p| p.doc_id);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool { self.finalized }

    pub fn term_count(&self) -> usize { self.postings.len() }

    pub fn get(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    /// The doc ids that contain `term`, as an owned set.
    pub fn doc_ids(&self, term: &str) -> HashSet<DocId> {
        self.get(term)
            .map(|list| list.iter().map(|p| p.doc_id).collect())
            .unwrap_or_default()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        if !self.finalized {
            tracing::warn!(terms = self.postings.len(), "serializing an index that was not finalized; postings order is insertion order");
        }
        Ok(serde_json::to_vec(self)?)
    }

    /// Restore an index from [`InvertedIndex::serialize`] output.
    ///
    /// Postings order is taken as stored. The result is finalized.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut index: Self = serde_json::from_slice(bytes)?;
        for (term, list) in &index.postings {
            if list.iter().any(|p| p.tf == 0) {
                return Err(SearchError::InvalidTermFrequency { term: term.clone() });
            }
        }
        index.finalized = true;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(t, n)| (t.to_string(), *n)).collect()
    }

    #[test]
    fn add_then_finalize_sorts_postings() {
        let mut idx = InvertedIndex::new();
        idx.add_document(9, &tf(&[("fox", 1)])).unwrap();
        idx.add_document(2, &tf(&[("fox", 3), ("den", 1)])).unwrap();
        assert_eq!(idx.get("fox").unwrap()[0].doc_id, 9);

        idx.finalize();
        let fox: Vec<DocId> = idx.get("fox").unwrap().iter().map(|p| p.doc_id).collect();
        assert_eq!(fox, vec![2, 9]);
        assert_eq!(idx.doc_count, 2);
        assert_eq!(idx.term_count(), 2);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut idx = InvertedIndex::new();
        idx.add_document(3, &tf(&[("a", 1)])).unwrap();
        idx.add_document(1, &tf(&[("a", 1)])).unwrap();
        idx.finalize();
        let once = idx.serialize().unwrap();
        idx.finalize();
        assert_eq!(once, idx.serialize().unwrap());
    }

    #[test]
    fn rejects_mutation_after_finalize() {
        let mut idx = InvertedIndex::new();
        idx.finalize();
        let err = idx.add_document(1, &tf(&[("a", 1)])).unwrap_err();
        assert!(matches!(err, SearchError::IndexFinalized));
    }

    #[test]
    fn rejects_zero_tf_without_partial_apply() {
        let mut idx = InvertedIndex::new();
        let err = idx.add_document(1, &tf(&[("a", 1), ("b", 0)])).unwrap_err();
        assert!(matches!(err, SearchError::InvalidTermFrequency { .. }));
        assert_eq!(idx.doc_count, 0);
        assert!(idx.get("a").is_none());
    }

    #[test]
    fn rejects_duplicate_doc() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tf(&[("a", 1)])).unwrap();
        let err = idx.add_document(1, &tf(&[("a", 1)])).unwrap_err();
        assert!(matches!(err, SearchError::DuplicateDocument(1)));
        assert_eq!(idx.get("a").unwrap().len(), 1);
    }

    #[test]
    fn empty_document_still_counts() {
        let mut idx = InvertedIndex::new();
        idx.add_document(5, &HashMap::new()).unwrap();
        assert_eq!(idx.doc_count, 1);
        assert_eq!(idx.term_count(), 0);
    }

    #[test]
    fn serialized_shape() {
        let mut idx = InvertedIndex::new();
        idx.add_document(2, &tf(&[("b", 1), ("a", 2)])).unwrap();
        idx.finalize();
        let s = String::from_utf8(idx.serialize().unwrap()).unwrap();
        assert_eq!(s, r#"{"docCount":1,"postings":{"a":[{"docId":2,"tf":2}],"b":[{"docId":2,"tf":1}]}}"#);
    }
}
