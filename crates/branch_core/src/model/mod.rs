//! Typed domain model for branch records.
//!
//! # Responsibility
//! - Define the read model returned by the storage adapter and service.
//! - Mirror the canonical schema's wire names (camelCase, `_id`).
//!
//! # Invariants
//! - A `BranchRecord` always carries the storage-assigned identifier.
//! - Contact data lives and dies with its branch.

pub mod branch;
