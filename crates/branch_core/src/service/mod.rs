//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, repository calls and audit emission into the public API.
//! - Keep CLI and transport layers decoupled from storage details.

pub mod branch_service;
