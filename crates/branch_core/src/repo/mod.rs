//! Repository layer over document stores.
//!
//! # Responsibility
//! - Translate branch use-cases into document store calls.
//! - Decode stored documents into typed records.
//!
//! # Invariants
//! - Writes only accept `ValidatedBranch`, so nothing unvalidated reaches storage.
//! - Store failures are propagated, never converted into empty results.

pub mod branch_repo;
