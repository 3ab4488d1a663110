//! Embedded document store backed by sled.
//!
//! Documents live in one tree keyed by the big-endian bytes of their id, so the
//! tree's natural key order is ascending id order and keyset pagination is a
//! plain range scan.

use crate::builder::{DocumentSource, SourceDocument};
use crate::error::{Result, SearchError};
use crate::index::DocId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const DOCUMENTS_TREE: &str = "documents";

/// A document as submitted by a client, before it has an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "body")]
    pub content: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into(), created_at: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocId,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

pub struct DocumentStore {
    db: sled::Db,
    docs: sled::Tree,
}

impl DocumentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let docs = db.open_tree(DOCUMENTS_TREE)?;
        Ok(Self { db, docs })
    }

    pub fn insert(&self, doc: NewDocument) -> Result<StoredDocument> {
        let created_at = validate(&doc, None)?;
        let stored = StoredDocument { id: self.next_id()?, title: doc.title, content: doc.content, created_at };
        self.docs.insert(stored.id.to_be_bytes(), bincode::serialize(&stored)?)?;
        Ok(stored)
    }

    /// Insert all documents or none. Every document is validated before any
    /// id is allocated.
    pub fn insert_batch(&self, docs: Vec<NewDocument>) -> Result<Vec<StoredDocument>> {
        let timestamps = docs
            .iter()
            .enumerate()
            .map(|(i, d)| validate(d, Some(i)))
            .collect::<Result<Vec<_>>>()?;

        let mut batch = sled::Batch::default();
        let mut stored = Vec::with_capacity(docs.len());
        for (doc, created_at) in docs.into_iter().zip(timestamps) {
            let s = StoredDocument { id: self.next_id()?, title: doc.title, content: doc.content, created_at };
            batch.insert(s.id.to_be_bytes().to_vec(), bincode::serialize(&s)?);
            stored.push(s);
        }
        self.docs.apply_batch(batch)?;
        Ok(stored)
    }

    pub fn get(&self, id: DocId) -> Result<Option<StoredDocument>> {
        match self.docs.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Full documents after `after_id`, ascending, at most `limit`.
    pub fn page(&self, after_id: DocId, limit: usize) -> Result<Vec<StoredDocument>> {
        let start = match after_id.checked_add(1) {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        for entry in self.docs.range(start.to_be_bytes()..).take(limit) {
            let (_, bytes) = entry?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // sled ids start at 0, which is the pagination sentinel.
    fn next_id(&self) -> Result<DocId> {
        Ok(self.db.generate_id()? + 1)
    }
}

impl DocumentSource for DocumentStore {
    fn fetch_page(&self, after_id: DocId, limit: usize) -> Result<Vec<SourceDocument>> {
        Ok(self
            .page(after_id, limit)?
            .into_iter()
            .map(|d| SourceDocument { id: d.id, content: d.content })
            .collect())
    }
}

fn validate(doc: &NewDocument, position: Option<usize>) -> Result<String> {
    let field = |name: &str| match position {
        Some(i) => format!("docs[{i}].{name}"),
        None => name.to_string(),
    };
    if doc.title.trim().is_empty() {
        return Err(SearchError::InvalidDocument(format!("{} is required", field("title"))));
    }
    if doc.content.trim().is_empty() {
        return Err(SearchError::InvalidDocument(format!("{} is required", field("content"))));
    }
    match &doc.created_at {
        Some(ts) => {
            OffsetDateTime::parse(ts, &Rfc3339)
                .map_err(|e| SearchError::InvalidDocument(format!("{}: {e}", field("created_at"))))?;
            Ok(ts.clone())
        }
        None => OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| SearchError::Time(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_ascend() {
        let store = DocumentStore::temporary().unwrap();
        let a = store.insert(NewDocument::new("a", "alpha")).unwrap();
        let b = store.insert(NewDocument::new("b", "beta")).unwrap();
        assert!(a.id >= 1);
        assert!(b.id > a.id);
        assert_eq!(store.get(b.id).unwrap().unwrap().content, "beta");
        assert_eq!(store.get(b.id + 1000).unwrap(), None);
    }

    #[test]
    fn rejects_blank_fields() {
        let store = DocumentStore::temporary().unwrap();
        let err = store.insert(NewDocument::new("  ", "x")).unwrap_err();
        assert!(err.to_string().contains("title is required"));
        let err = store
            .insert_batch(vec![NewDocument::new("ok", "ok"), NewDocument::new("t", "")])
            .unwrap_err();
        assert!(err.to_string().contains("docs[1].content is required"));
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let store = DocumentStore::temporary().unwrap();
        let doc = NewDocument { created_at: Some("yesterday".into()), ..NewDocument::new("t", "c") };
        assert!(matches!(store.insert(doc), Err(SearchError::InvalidDocument(_))));
    }

    #[test]
    fn pages_by_keyset() {
        let store = DocumentStore::temporary().unwrap();
        let docs: Vec<NewDocument> = (0..5).map(|i| NewDocument::new(format!("t{i}"), format!("doc {i}"))).collect();
        let stored = store.insert_batch(docs).unwrap();

        let first = store.fetch_page(0, 2).unwrap();
        assert_eq!(first.iter().map(|d| d.id).collect::<Vec<_>>(), vec![stored[0].id, stored[1].id]);
        let rest = store.fetch_page(stored[1].id, 10).unwrap();
        assert_eq!(rest.len(), 3);
        assert!(store.fetch_page(stored[4].id, 10).unwrap().is_empty());
        assert!(store.fetch_page(DocId::MAX, 10).unwrap().is_empty());
    }

    #[test]
    fn accepts_body_alias() {
        let doc: NewDocument = serde_json::from_str(r#"{"title":"t","body":"b","createdAt":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(doc.content, "b");
        assert_eq!(doc.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
