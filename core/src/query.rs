//! Boolean AND/OR evaluation over postings sets.

use crate::error::{Result, SearchError};
use crate::index::{DocId, InvertedIndex};
use crate::tokenizer::{tokenize, TokenizeOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Anything that can answer "which documents contain this term".
///
/// Implementations hand back an owned set, so the evaluator can never mutate
/// state owned by the index.
pub trait PostingsLookup {
    fn postings(&self, term: &str) -> HashSet<DocId>;
}

/// Exact term lookup, no normalization.
impl PostingsLookup for InvertedIndex {
    fn postings(&self, term: &str) -> HashSet<DocId> {
        self.doc_ids(term)
    }
}

/// Runs each query term through the index-time tokenizer before lookup.
///
/// A term that normalizes to several tokens ("state-of-the-art") matches the
/// documents containing all of them. A term that normalizes to nothing matches
/// nothing.
pub struct NormalizedLookup<'a> {
    index: &'a InvertedIndex,
    options: TokenizeOptions,
}

impl<'a> NormalizedLookup<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self { index, options: TokenizeOptions::default() }
    }

    pub fn with_options(index: &'a InvertedIndex, options: TokenizeOptions) -> Self {
        Self { index, options }
    }
}

impl PostingsLookup for NormalizedLookup<'_> {
    fn postings(&self, term: &str) -> HashSet<DocId> {
        let mut acc: Option<HashSet<DocId>> = None;
        for token in tokenize(term, &self.options) {
            let set = self.index.doc_ids(&token);
            acc = Some(match acc {
                None => set,
                Some(prev) => intersect(&prev, &set),
            });
            if acc.as_ref().is_some_and(HashSet::is_empty) {
                break;
            }
        }
        acc.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    And,
    Or,
}

impl QueryMode {
    /// Parse an optional request parameter. Missing or empty means AND.
    pub fn from_param(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Self::And),
            Some(s) if s.is_empty() => Ok(Self::And),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for QueryMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(SearchError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

/// Parse an optional result limit. Missing or empty means unlimited; anything
/// that is not a non-negative integer is rejected.
pub fn parse_limit(raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|_| SearchError::InvalidLimit(s.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub terms: Vec<String>,
    pub mode: QueryMode,
    pub limit: Option<usize>,
}

impl Query {
    /// Split `raw` on whitespace into terms.
    pub fn parse(raw: &str, mode: QueryMode, limit: Option<usize>) -> Self {
        let terms = raw.split_whitespace().map(str::to_string).collect();
        Self { terms, mode, limit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub terms: Vec<String>,
    pub mode: QueryMode,
    pub doc_ids: Vec<DocId>,
}

/// Intersect two sets, probing the larger with the members of the smaller.
pub fn intersect(a: &HashSet<DocId>, b: &HashSet<DocId>) -> HashSet<DocId> {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|id| large.contains(*id)).copied().collect()
}

fn union_into(mut acc: HashSet<DocId>, other: &HashSet<DocId>) -> HashSet<DocId> {
    acc.extend(other.iter().copied());
    acc
}

/// Evaluate `query` against `lookup`. Doc ids come back ascending, truncated to
/// `query.limit` when set.
pub fn evaluate<L>(query: &Query, lookup: &L) -> QueryResult
where
    L: PostingsLookup + ?Sized,
{
    let mut acc: Option<HashSet<DocId>> = None;
    for term in &query.terms {
        let set = lookup.postings(term);
        let next = match (acc, query.mode) {
            (None, _) => set,
            (Some(prev), QueryMode::And) => intersect(&prev, &set),
            (Some(prev), QueryMode::Or) => union_into(prev, &set),
        };
        let empty = next.is_empty();
        acc = Some(next);
        if query.mode == QueryMode::And && empty {
            break;
        }
    }

    let mut doc_ids: Vec<DocId> = acc.map(|s| s.into_iter().collect()).unwrap_or_default();
    doc_ids.sort_unstable();
    if let Some(limit) = query.limit {
        doc_ids.truncate(limit);
    }

    QueryResult { terms: query.terms.clone(), mode: query.mode, doc_ids }
}
