//! Generic document store contract.
//!
//! # Responsibility
//! - Define the narrow async interface the branch storage adapter consumes.
//! - Normalize backend failures into one `StoreError` taxonomy.
//!
//! # Invariants
//! - "Zero documents matched" is `None` or an empty vec, never an error.
//! - Every backend failure, including malformed ids, is returned as `Err`.
//! - Results are returned in insertion order.

mod sqlite;

pub use sqlite::{open_branch_store, SqliteDocumentStore};

use crate::db::DbError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved key carrying the storage-assigned identifier.
pub const ID_FIELD: &str = "_id";

/// Untyped JSON document as stored.
pub type Document = Map<String, Value>;

/// Equality filter keyed by top-level or dotted field paths.
pub type Filter = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique index or required-field constraint rejected a write.
    #[error("constraint `{constraint}` violated: {message}")]
    ConstraintViolation { constraint: String, message: String },
    /// Identifier does not have the store's id shape.
    #[error("malformed identifier `{0}`: expected a UUID")]
    MalformedIdentifier(String),
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),
    /// Backend could not run the operation at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation {
                    constraint: "unique".to_string(),
                    message: message.unwrap_or_else(|| failure.to_string()),
                }
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

/// Storage-side description of one collection.
///
/// Produced from the canonical schema's persistence view; stores use it to
/// build unique indexes, reject documents lacking required fields and fill
/// insert defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub required: Vec<&'static str>,
    pub unique: Vec<&'static str>,
    pub defaults: Vec<(&'static str, Value)>,
}

impl CollectionSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            required: Vec::new(),
            unique: Vec::new(),
            defaults: Vec::new(),
        }
    }
}

/// Async document collection consumed by repositories.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts one document and returns it with the assigned `_id`.
    async fn insert(&self, document: Document) -> StoreResult<Document>;
    /// Returns documents matching `filter`, at most `limit` when set.
    async fn find_many(&self, filter: &Filter, limit: Option<u32>) -> StoreResult<Vec<Document>>;
    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>>;
    /// Returns the document with `id`; rejects ids that are not well formed.
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>>;
    /// Removes every document of the collection and returns the count.
    async fn delete_all(&self) -> StoreResult<u64>;
}
