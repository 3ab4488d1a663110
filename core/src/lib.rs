pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod store;
pub mod synth;
pub mod tokenizer;

pub use builder::{build, BuildOptions, DocumentSource, SourceDocument};
pub use error::{Result, SearchError};
pub use index::{DocId, InvertedIndex, Posting};
pub use query::{evaluate, NormalizedLookup, PostingsLookup, Query, QueryMode, QueryResult};
pub use store::{DocumentStore, NewDocument, StoredDocument};
