//! Branch storage adapter.
//!
//! # Responsibility
//! - Provide save / list / lookup / filter / reset over a `DocumentStore`.
//! - Keep document shapes and filter construction out of the service layer.
//!
//! # Invariants
//! - Only "zero documents matched" collapses to `None` or an empty vec.
//! - Read paths reject undecodable persisted documents instead of masking them.

use crate::model::branch::BranchRecord;
use crate::schema::cast_filter_value;
use crate::schema::validator::ValidatedBranch;
use crate::store::{Document, DocumentStore, Filter, StoreError};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid persisted branch data: {0}")]
    InvalidData(String),
}

/// Branch repository backed by any document store.
pub struct BranchRepository<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> BranchRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a validated branch and returns it with its assigned id.
    ///
    /// # Errors
    /// - `StoreError::ConstraintViolation` for a duplicate `entityCode`.
    pub async fn save(&self, branch: ValidatedBranch) -> RepoResult<BranchRecord> {
        let stored = self
            .store
            .insert(branch.into_document())
            .await
            .map_err(|err| log_failure("branch_save", err))?;
        let record = decode_record(stored)?;
        debug!(
            "event=branch_save module=repo status=ok id={} entity_code={}",
            record.id, record.branch.entity_code
        );
        Ok(record)
    }

    /// Lists branches in insertion order.
    ///
    /// `limit < 1` returns every branch.
    pub async fn find_all(&self, limit: i64) -> RepoResult<Vec<BranchRecord>> {
        let limit = normalize_limit(limit);
        let documents = self
            .store
            .find_many(&Filter::new(), limit)
            .await
            .map_err(|err| log_failure("branch_find_all", err))?;
        debug!(
            "event=branch_find_all module=repo status=ok limit={:?} count={}",
            limit,
            documents.len()
        );
        decode_records(documents)
    }

    /// Returns the first branch whose `attribute` equals `value`.
    pub async fn find_one(&self, attribute: &str, value: &Value) -> RepoResult<Option<BranchRecord>> {
        let filter = attribute_filter(attribute, value);
        let document = self
            .store
            .find_one(&filter)
            .await
            .map_err(|err| log_failure("branch_find_one", err))?;
        debug!(
            "event=branch_find_one module=repo status=ok attribute={attribute} found={}",
            document.is_some()
        );
        document.map(decode_record).transpose()
    }

    /// Returns every branch whose `attribute` equals `value`.
    pub async fn find_many(&self, attribute: &str, value: &Value) -> RepoResult<Vec<BranchRecord>> {
        self.filter_by_query(&attribute_filter(attribute, value))
            .await
    }

    /// Returns the branch with `id`.
    ///
    /// # Errors
    /// - `StoreError::MalformedIdentifier` when `id` is not a well-formed id.
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<BranchRecord>> {
        let document = self
            .store
            .find_by_id(id)
            .await
            .map_err(|err| log_failure("branch_find_by_id", err))?;
        debug!(
            "event=branch_find_by_id module=repo status=ok found={}",
            document.is_some()
        );
        document.map(decode_record).transpose()
    }

    /// Returns every branch matching an equality filter.
    ///
    /// Values are cast to each field's declared type first, so `"1"` matches a
    /// stored `level` of `1`.
    pub async fn filter_by_query(&self, filter: &Filter) -> RepoResult<Vec<BranchRecord>> {
        let filter = cast_filter(filter);
        let documents = self
            .store
            .find_many(&filter, None)
            .await
            .map_err(|err| log_failure("branch_filter", err))?;
        debug!(
            "event=branch_filter module=repo status=ok keys={} count={}",
            filter.len(),
            documents.len()
        );
        decode_records(documents)
    }

    /// Removes every branch. Reserved for administrative reset and tests.
    pub async fn delete_all(&self) -> RepoResult<u64> {
        let removed = self
            .store
            .delete_all()
            .await
            .map_err(|err| log_failure("branch_delete_all", err))?;
        warn!("event=branch_delete_all module=repo status=ok removed={removed}");
        Ok(removed)
    }
}

fn normalize_limit(limit: i64) -> Option<u32> {
    if limit < 1 {
        return None;
    }
    Some(u32::try_from(limit).unwrap_or(u32::MAX))
}

fn attribute_filter(attribute: &str, value: &Value) -> Filter {
    let mut filter = Filter::new();
    filter.insert(attribute.to_string(), cast_filter_value(attribute, value));
    filter
}

fn cast_filter(filter: &Filter) -> Filter {
    filter
        .iter()
        .map(|(key, value)| (key.clone(), cast_filter_value(key, value)))
        .collect()
}

fn decode_record(document: Document) -> RepoResult<BranchRecord> {
    serde_json::from_value(Value::Object(document))
        .map_err(|err| RepoError::InvalidData(err.to_string()))
}

fn decode_records(documents: Vec<Document>) -> RepoResult<Vec<BranchRecord>> {
    documents.into_iter().map(decode_record).collect()
}

fn log_failure(event: &'static str, err: StoreError) -> RepoError {
    debug!("event={event} module=repo status=error error={err}");
    RepoError::Store(err)
}
