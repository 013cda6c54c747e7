//! Exhaustive validation of untyped branch records.
//!
//! # Responsibility
//! - Check a candidate record against the validation view of the schema.
//! - Report every violation in one pass, in schema declaration order.
//!
//! # Invariants
//! - A missing record (`None` or JSON `null`) is a caller error, not a violation.
//! - [`ValidatedBranch`] can only be produced by a passing validation run.

use super::{integral, validation_view, FieldKind, FieldSpec};
use crate::store::Document;
use chrono::DateTime;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why one field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    WrongType { expected: &'static str },
    TooShort { min: usize },
    TooLong { max: usize },
    PatternMismatch { pattern: &'static str },
    InvalidFormat { format: &'static str },
}

/// One failed constraint, addressed by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path such as `contact.email`; empty for the record itself.
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    fn new(path: &str, kind: ViolationKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() {
            "<record>"
        } else {
            self.path.as_str()
        };
        match &self.kind {
            ViolationKind::Missing => write!(f, "{path}: is required"),
            ViolationKind::WrongType { expected } => write!(f, "{path}: must be of type {expected}"),
            ViolationKind::TooShort { min } => write!(f, "{path}: length must be at least {min}"),
            ViolationKind::TooLong { max } => write!(f, "{path}: length must be at most {max}"),
            ViolationKind::PatternMismatch { pattern } => {
                write!(f, "{path}: must match pattern `{pattern}`")
            }
            ViolationKind::InvalidFormat { format } => write!(f, "{path}: must be a valid {format}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("branch record is null or undefined")]
    MissingRecord,
    #[error("branch record failed validation: {}", join_violations(.0))]
    Invalid(Vec<Violation>),
}

/// A branch document that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBranch(Document);

impl ValidatedBranch {
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// Validates `record` and wraps it for persistence on success.
///
/// # Errors
/// - `MissingRecord` when `record` is `None` or JSON `null`.
/// - `Invalid` with every violation when any constraint fails.
pub fn validate_branch(record: Option<&Value>) -> Result<ValidatedBranch, ValidationError> {
    let record = match record {
        None | Some(Value::Null) => return Err(ValidationError::MissingRecord),
        Some(record) => record,
    };

    let mut violations = Vec::new();
    let Value::Object(document) = record else {
        violations.push(Violation::new(
            "",
            ViolationKind::WrongType { expected: "object" },
        ));
        return Err(ValidationError::Invalid(violations));
    };

    check_fields(document, validation_view(), "", &mut violations);
    if !violations.is_empty() {
        return Err(ValidationError::Invalid(violations));
    }

    let mut document = document.clone();
    normalize_integers(&mut document, validation_view());
    Ok(ValidatedBranch(document))
}

/// Returns every violation of `record`; empty means the record conforms.
pub fn check_branch(record: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    match record {
        Value::Object(document) => check_fields(document, validation_view(), "", &mut violations),
        _ => violations.push(Violation::new(
            "",
            ViolationKind::WrongType { expected: "object" },
        )),
    }
    violations
}

fn check_fields(
    document: &Document,
    fields: &[FieldSpec],
    prefix: &str,
    violations: &mut Vec<Violation>,
) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{prefix}.{}", field.name)
        };

        match document.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    violations.push(Violation::new(&path, ViolationKind::Missing));
                }
            }
            Some(value) => check_value(value, field, &path, violations),
        }
    }
}

fn check_value(value: &Value, field: &FieldSpec, path: &str, violations: &mut Vec<Violation>) {
    let wrong_type = || {
        Violation::new(
            path,
            ViolationKind::WrongType {
                expected: field.kind.json_type(),
            },
        )
    };

    match field.kind {
        FieldKind::String => match value.as_str() {
            Some(text) => check_text(text, field, path, violations),
            None => violations.push(wrong_type()),
        },
        FieldKind::Integer => {
            // The read model stores `level` as i64.
            if integral(value).is_none() {
                violations.push(wrong_type());
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                violations.push(wrong_type());
            }
        }
        FieldKind::DateTime => match value.as_str() {
            Some(text) => {
                if DateTime::parse_from_rfc3339(text).is_err() {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::InvalidFormat {
                            format: "date-time",
                        },
                    ));
                }
            }
            None => violations.push(wrong_type()),
        },
        FieldKind::Object(nested) => match value.as_object() {
            Some(document) => check_fields(document, nested, path, violations),
            None => violations.push(wrong_type()),
        },
    }
}

fn check_text(text: &str, field: &FieldSpec, path: &str, violations: &mut Vec<Violation>) {
    let length = text.chars().count();
    let mut too_short = false;
    if let Some(min) = field.min_len {
        if length < min {
            too_short = true;
            violations.push(Violation::new(path, ViolationKind::TooShort { min }));
        }
    }
    if let Some(max) = field.max_len {
        if length > max {
            violations.push(Violation::new(path, ViolationKind::TooLong { max }));
        }
    }
    // An empty value already reported as too short is not a pattern mismatch too.
    if let Some(pattern) = field.pattern {
        if !(too_short && text.is_empty()) && !pattern.is_match(text) {
            violations.push(Violation::new(
                path,
                ViolationKind::PatternMismatch {
                    pattern: pattern.as_str(),
                },
            ));
        }
    }
}

/// Rewrites whole-number floats such as `1.0` in integer fields as `i64`.
fn normalize_integers(document: &mut Document, fields: &[FieldSpec]) {
    for field in fields {
        let Some(value) = document.get_mut(field.name) else {
            continue;
        };
        match field.kind {
            FieldKind::Integer => {
                if let Some(integer) = integral(value) {
                    *value = Value::from(integer);
                }
            }
            FieldKind::Object(nested) => {
                if let Value::Object(inner) = value {
                    normalize_integers(inner, nested);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::{check_branch, validate_branch, Violation, ViolationKind};
    use serde_json::json;

    #[test]
    fn non_object_record_reports_root_type_violation() {
        let violations = check_branch(&json!([1, 2, 3]));
        assert_eq!(
            violations,
            vec![Violation {
                path: String::new(),
                kind: ViolationKind::WrongType { expected: "object" },
            }]
        );
    }

    #[test]
    fn empty_bounded_field_reports_length_only() {
        let violations = check_branch(&json!({ "entityCode": "" }));
        let entity_code: Vec<_> = violations
            .iter()
            .filter(|violation| violation.path == "entityCode")
            .collect();
        assert_eq!(entity_code.len(), 1);
        assert_eq!(entity_code[0].kind, ViolationKind::TooShort { min: 1 });
    }

    #[test]
    fn empty_unbounded_pattern_field_reports_pattern_mismatch() {
        let violations = check_branch(&json!({ "parent": "" }));
        assert!(violations.iter().any(|violation| violation.path == "parent"
            && matches!(violation.kind, ViolationKind::PatternMismatch { .. })));
    }

    #[test]
    fn violation_display_names_path_and_constraint() {
        let violation = Violation {
            path: "contact.email".to_string(),
            kind: ViolationKind::TooShort { min: 8 },
        };
        assert_eq!(violation.to_string(), "contact.email: length must be at least 8");
    }

    #[test]
    fn whole_float_level_is_accepted_and_stored_as_integer() {
        let mut record = json!({
            "tenantId": "IVL",
            "entityCode": "entity1",
            "name": "entity1",
            "level": 1.0,
            "description": "entity1 description",
            "processingStatus": "authorized",
            "createdBy": "SYSTEM",
            "createdDate": "2024-03-01T10:00:00Z",
            "parent": "hq"
        });
        let validated = validate_branch(Some(&record)).unwrap();
        assert_eq!(validated.as_document()["level"].as_i64(), Some(1));

        record["level"] = json!(1.25);
        assert!(validate_branch(Some(&record)).is_err());
    }
}
