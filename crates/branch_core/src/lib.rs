//! Core domain logic for tenant-scoped branch management.
//! This crate is the single source of truth for branch invariants.

pub mod audit;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;
pub mod store;

pub use audit::{AuditEvent, AuditSink, AuditStatus, ChannelAuditSink, LogAuditSink, NoopAuditSink};
pub use config::{AuditConfig, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::branch::{Branch, BranchId, BranchRecord, Contact};
pub use repo::branch_repo::{BranchRepository, RepoError, RepoResult};
pub use schema::validator::{validate_branch, ValidatedBranch, ValidationError, Violation, ViolationKind};
pub use service::branch_service::{BranchService, ErrorKind, ServiceError, ServiceResult};
pub use store::{
    open_branch_store, CollectionSpec, Document, DocumentStore, Filter, SqliteDocumentStore,
    StoreError, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
