//! Environment-driven configuration.
//!
//! # Invariants
//! - Empty environment values are treated as unset.
//! - `from_lookup` never touches the process environment, so tests stay isolated.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "BRANCH_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "BRANCH_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BRANCH_LOG_DIR";
pub const ENV_AUDIT_APPLICATION: &str = "BRANCH_AUDIT_APPLICATION";
pub const ENV_AUDIT_SOURCE: &str = "BRANCH_AUDIT_SOURCE";
pub const ENV_AUDIT_CREATED_BY: &str = "BRANCH_AUDIT_CREATED_BY";

/// Fixed fields stamped on every audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub application: String,
    pub source: String,
    pub created_by: String,
    pub ip_address: String,
    pub level: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            application: "PLATFORM".to_string(),
            source: "branch".to_string(),
            created_by: "SYSTEM".to_string(),
            ip_address: String::new(),
            level: String::new(),
        }
    }
}

/// Process-level configuration for the branch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite database file. `None` selects an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub log_dir: Option<String>,
    pub audit: AuditConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            audit: AuditConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Reads configuration from `BRANCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR),
            audit: AuditConfig {
                application: read(ENV_AUDIT_APPLICATION).unwrap_or(defaults.audit.application),
                source: read(ENV_AUDIT_SOURCE).unwrap_or(defaults.audit.source),
                created_by: read(ENV_AUDIT_CREATED_BY).unwrap_or(defaults.audit.created_by),
                ..defaults.audit
            },
        }
    }
}
