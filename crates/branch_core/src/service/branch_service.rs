//! Branch use-case service.
//!
//! # Responsibility
//! - Expose the public branch operation set.
//! - Check caller arguments, validate before persisting, and emit audit events.
//! - Normalize "not found" into `None` (single lookups) or empty vecs (multi lookups).
//!
//! # Invariants
//! - `save` never reaches the repository with a record that failed validation.
//! - Every call posts its own freshly built audit events; audit posting cannot fail a call.
//! - Storage errors, malformed ids included, are returned, never swallowed.

use crate::audit::{AuditEvent, AuditSink, AuditStatus};
use crate::config::AuditConfig;
use crate::model::branch::BranchRecord;
use crate::repo::branch_repo::{BranchRepository, RepoError};
use crate::schema::validator::{join_violations, validate_branch, ValidationError, Violation};
use crate::store::{DocumentStore, Filter, StoreError};
use log::{debug, warn};
use serde_json::{json, Value};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required argument was missing (`None` or JSON `null`).
    #[error("IllegalArgumentException: {0}")]
    IllegalArgument(String),
    /// The record failed schema validation; carries every violation.
    #[error("branch validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<Violation>),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Coarse error classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalArgument,
    ValidationFailed,
    StorageConstraintViolation,
    StorageUnavailable,
    MalformedIdentifier,
    /// Undecodable stored data, unsupported filters and encoding failures.
    StorageFailure,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalArgument(_) => ErrorKind::IllegalArgument,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::Repo(RepoError::Store(err)) => match err {
                StoreError::ConstraintViolation { .. } => ErrorKind::StorageConstraintViolation,
                StoreError::MalformedIdentifier(_) => ErrorKind::MalformedIdentifier,
                StoreError::Unavailable(_) | StoreError::Db(_) => ErrorKind::StorageUnavailable,
                StoreError::UnsupportedFilter(_) | StoreError::Encoding(_) => {
                    ErrorKind::StorageFailure
                }
            },
            Self::Repo(RepoError::InvalidData(_)) => ErrorKind::StorageFailure,
        }
    }

    /// Returns the violation list of a `ValidationFailed` error.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::ValidationFailed(violations) => Some(violations.as_slice()),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::MissingRecord => {
                Self::IllegalArgument("branch record is null or undefined".to_string())
            }
            ValidationError::Invalid(violations) => Self::ValidationFailed(violations),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Validate,
    Save,
    GetAll,
    GetById,
    GetOne,
    GetMany,
    Filter,
}

impl Operation {
    fn event_name(self) -> &'static str {
        match self {
            Self::Validate => "branch_validate",
            Self::Save => "branch_save",
            Self::GetAll => "branch_get_all",
            Self::GetById => "branch_get_by_id",
            Self::GetOne => "branch_get_one",
            Self::GetMany => "branch_get_many",
            Self::Filter => "branch_filter_by_branch_details",
        }
    }

    fn exception_event_name(self) -> &'static str {
        match self {
            Self::Validate => "branch_exception_on_validate",
            Self::Save => "branch_exception_on_save",
            Self::GetAll => "branch_exception_on_get_all",
            Self::GetById => "branch_exception_on_get_by_id",
            Self::GetOne => "branch_exception_on_get_one",
            Self::GetMany => "branch_exception_on_get_many",
            Self::Filter => "branch_exception_on_filter_by_branch_details",
        }
    }
}

/// Public branch facade over a repository and an audit sink.
pub struct BranchService<S: DocumentStore, A: AuditSink> {
    repo: BranchRepository<S>,
    audit: A,
    audit_config: AuditConfig,
}

impl<S: DocumentStore, A: AuditSink> BranchService<S, A> {
    pub fn new(repo: BranchRepository<S>, audit: A, audit_config: AuditConfig) -> Self {
        Self {
            repo,
            audit,
            audit_config,
        }
    }

    pub fn repository(&self) -> &BranchRepository<S> {
        &self.repo
    }

    /// Validates a record without persisting it.
    ///
    /// # Errors
    /// - `IllegalArgument` when `record` is `None` or JSON `null`.
    /// - `ValidationFailed` with every violation otherwise.
    pub async fn validate(&self, record: Option<&Value>) -> ServiceResult<()> {
        let op = Operation::Validate;
        let Some(record) = present(record) else {
            return Err(self.reject(
                op,
                "null".to_string(),
                missing("branch record"),
            ));
        };

        self.post(op, record.to_string(), "branch validation initiated");
        validate_branch(Some(record))?;
        debug!("event=branch_validate module=service status=ok");
        Ok(())
    }

    /// Validates and persists a new branch.
    ///
    /// The attempt is audited before the validation outcome is known.
    ///
    /// # Errors
    /// - `IllegalArgument` when `record` is `None` or JSON `null`.
    /// - `ValidationFailed` when the record does not conform; nothing is written.
    /// - Storage errors, e.g. a constraint violation for a duplicate `entityCode`.
    pub async fn save(&self, record: Option<&Value>) -> ServiceResult<BranchRecord> {
        let op = Operation::Save;
        let Some(record) = present(record) else {
            return Err(self.reject(
                op,
                "null".to_string(),
                missing("branch record"),
            ));
        };

        let key_data = record.to_string();
        self.post(op, key_data.clone(), "branch creation initiated");

        let validated = match validate_branch(Some(record)) {
            Ok(validated) => validated,
            Err(err) => {
                debug!("event=branch_save module=service status=rejected reason=validation");
                return Err(err.into());
            }
        };

        match self.repo.save(validated).await {
            Ok(saved) => {
                debug!("event=branch_save module=service status=ok id={}", saved.id);
                Ok(saved)
            }
            Err(err) => Err(self.reject(op, key_data, err.into())),
        }
    }

    /// Lists branches; `limit < 1` returns all of them.
    pub async fn get_all(&self, limit: Option<i64>) -> ServiceResult<Vec<BranchRecord>> {
        let op = Operation::GetAll;
        let Some(limit) = limit else {
            return Err(self.reject(op, json!({ "limit": null }).to_string(), missing("limit")));
        };

        let key_data = json!({ "limit": limit }).to_string();
        self.post(op, key_data.clone(), "branch getAll initiated");
        self.repo
            .find_all(limit)
            .await
            .map_err(|err| self.reject(op, key_data, err.into()))
    }

    /// Looks up one branch by id; `Ok(None)` when no branch has that id.
    ///
    /// # Errors
    /// - `IllegalArgument` when `id` is `None`.
    /// - A malformed-identifier storage error when `id` is not a valid id.
    pub async fn get_by_id(&self, id: Option<&str>) -> ServiceResult<Option<BranchRecord>> {
        let op = Operation::GetById;
        let Some(id) = id else {
            return Err(self.reject(op, json!({ "id": null }).to_string(), missing("id")));
        };

        let key_data = json!({ "id": id }).to_string();
        self.post(op, key_data.clone(), "branch getById initiated");
        let found = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|err| self.reject(op, key_data, err.into()))?;
        if found.is_none() {
            debug!("event=branch_get_by_id module=service status=ok found=false");
        }
        Ok(found)
    }

    /// Returns the first branch whose `attribute` equals `value`, or `Ok(None)`.
    pub async fn get_one(
        &self,
        attribute: Option<&str>,
        value: Option<&Value>,
    ) -> ServiceResult<Option<BranchRecord>> {
        let op = Operation::GetOne;
        let (attribute, value) = match (attribute, present(value)) {
            (Some(attribute), Some(value)) => (attribute, value),
            (attribute, value) => {
                return Err(self.reject(
                    op,
                    attribute_key_data(attribute, value),
                    missing("attribute/value"),
                ))
            }
        };

        let key_data = attribute_key_data(Some(attribute), Some(value));
        self.post(op, key_data.clone(), "branch getOne initiated");
        self.repo
            .find_one(attribute, value)
            .await
            .map_err(|err| self.reject(op, key_data, err.into()))
    }

    /// Returns every branch whose `attribute` equals `value`; empty when none match.
    pub async fn get_many(
        &self,
        attribute: Option<&str>,
        value: Option<&Value>,
    ) -> ServiceResult<Vec<BranchRecord>> {
        let op = Operation::GetMany;
        let (attribute, value) = match (attribute, present(value)) {
            (Some(attribute), Some(value)) => (attribute, value),
            (attribute, value) => {
                return Err(self.reject(
                    op,
                    attribute_key_data(attribute, value),
                    missing("attribute/value"),
                ))
            }
        };

        let key_data = attribute_key_data(Some(attribute), Some(value));
        self.post(op, key_data.clone(), "branch getMany initiated");
        self.repo
            .find_many(attribute, value)
            .await
            .map_err(|err| self.reject(op, key_data, err.into()))
    }

    /// Returns every branch matching an equality filter; empty when none match.
    pub async fn filter_by_branch_details(
        &self,
        filter: Option<&Filter>,
    ) -> ServiceResult<Vec<BranchRecord>> {
        let op = Operation::Filter;
        let Some(filter) = filter else {
            return Err(self.reject(op, "null".to_string(), missing("filterQuery")));
        };

        let key_data = Value::Object(filter.clone()).to_string();
        self.post(op, key_data.clone(), "branch filterByBranchDetails initiated");
        let matched = self
            .repo
            .filter_by_query(filter)
            .await
            .map_err(|err| self.reject(op, key_data, err.into()))?;
        if matched.is_empty() {
            debug!("event=branch_filter module=service status=ok count=0");
        }
        Ok(matched)
    }

    fn post(&self, op: Operation, key_data: String, details: &str) {
        self.audit.post(AuditEvent::new(
            &self.audit_config,
            op.event_name(),
            key_data,
            details,
        ));
    }

    /// Audits a failed call and hands the error back to the caller.
    fn reject(&self, op: Operation, key_data: String, err: ServiceError) -> ServiceError {
        warn!(
            "event={} module=service status=error kind={:?} error={}",
            op.event_name(),
            err.kind(),
            err
        );
        self.audit.post(
            AuditEvent::new(
                &self.audit_config,
                op.exception_event_name(),
                key_data,
                format!("caught exception on {}: {err}", op.event_name()),
            )
            .with_status(AuditStatus::Failure),
        );
        err
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn missing(argument: &str) -> ServiceError {
    ServiceError::IllegalArgument(format!("{argument} is null or undefined"))
}

fn attribute_key_data(attribute: Option<&str>, value: Option<&Value>) -> String {
    json!({ "attribute": attribute, "value": value }).to_string()
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ServiceError};
    use crate::repo::branch_repo::RepoError;
    use crate::schema::validator::{ValidationError, Violation, ViolationKind};
    use crate::store::StoreError;

    #[test]
    fn error_kinds_cover_storage_taxonomy() {
        let constraint = ServiceError::Repo(RepoError::Store(StoreError::ConstraintViolation {
            constraint: "unique".to_string(),
            message: "dup".to_string(),
        }));
        assert_eq!(constraint.kind(), ErrorKind::StorageConstraintViolation);

        let malformed =
            ServiceError::Repo(RepoError::Store(StoreError::MalformedIdentifier("x".into())));
        assert_eq!(malformed.kind(), ErrorKind::MalformedIdentifier);

        let unavailable =
            ServiceError::Repo(RepoError::Store(StoreError::Unavailable("down".into())));
        assert_eq!(unavailable.kind(), ErrorKind::StorageUnavailable);

        let invalid = ServiceError::Repo(RepoError::InvalidData("bad".into()));
        assert_eq!(invalid.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn validation_errors_map_to_service_errors() {
        let missing: ServiceError = ValidationError::MissingRecord.into();
        assert_eq!(missing.kind(), ErrorKind::IllegalArgument);
        assert!(missing.to_string().starts_with("IllegalArgumentException"));

        let violation = Violation {
            path: "name".to_string(),
            kind: ViolationKind::Missing,
        };
        let invalid: ServiceError = ValidationError::Invalid(vec![violation.clone()]).into();
        assert_eq!(invalid.violations(), Some(&[violation][..]));
    }
}
