//! Canonical branch schema and its derived views.
//!
//! # Responsibility
//! - Declare every branch field exactly once (`BRANCH_FIELDS`).
//! - Derive the validation view consumed by [`validator`].
//! - Derive the persistence view (`CollectionSpec`) consumed by document stores.
//!
//! # Invariants
//! - Both views are computed from the same declaration; neither is edited by hand.
//! - Only top-level fields take part in the persistence view.

pub mod validator;

use crate::store::CollectionSpec;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Collection name used for persisted branch documents.
pub const BRANCH_COLLECTION: &str = "branches";

static ALNUM_HYPHEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("valid alnum-hyphen regex"));
static ALNUM_SPACE_HYPHEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9 -]+$").expect("valid alnum-space-hyphen regex"));

/// Character classes a string field may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// ASCII letters, digits and `-`.
    AlphanumericHyphen,
    /// ASCII letters, digits, space and `-`.
    AlphanumericSpaceHyphen,
}

impl Pattern {
    /// Returns the regex source used for matching and error reporting.
    pub fn as_str(self) -> &'static str {
        self.regex().as_str()
    }

    pub fn is_match(self, value: &str) -> bool {
        self.regex().is_match(value)
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::AlphanumericHyphen => &ALNUM_HYPHEN_RE,
            Self::AlphanumericSpaceHyphen => &ALNUM_SPACE_HYPHEN_RE,
        }
    }
}

/// Wire type of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    /// RFC 3339 date-time carried as a JSON string.
    DateTime,
    /// Embedded object validated against nested field specs.
    Object(&'static [FieldSpec]),
}

impl FieldKind {
    /// JSON type name reported in type-mismatch violations.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String | Self::DateTime => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object(_) => "object",
        }
    }
}

/// Value filled in by storage when a field is absent on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
}

impl FieldDefault {
    pub fn to_json(self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(value),
        }
    }
}

/// Declaration of one field: type, presence, bounds and storage hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Enforced by a storage-level unique index, never by the validator.
    pub unique: bool,
    /// Minimum length in characters.
    pub min_len: Option<usize>,
    /// Maximum length in characters.
    pub max_len: Option<usize>,
    pub pattern: Option<Pattern>,
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            unique: false,
            min_len: None,
            max_len: None,
            pattern: None,
            default: None,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub const fn date_time(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub const fn object(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self::new(name, FieldKind::Object(fields))
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub const fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub const fn default_value(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Embedded contact fields. None of them is required.
pub const CONTACT_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("tenantId").length(1, 64),
    FieldSpec::string("firstName").length(1, 50),
    FieldSpec::string("middleName").length(1, 50),
    FieldSpec::string("lastName").length(1, 50),
    FieldSpec::string("email").length(8, 50),
    FieldSpec::boolean("emailVerified"),
    FieldSpec::string("phoneNo").length(5, 15),
    FieldSpec::string("mobileNo").length(5, 15),
    FieldSpec::boolean("mobileVerified"),
    FieldSpec::string("faxNumber").length(1, 15),
    FieldSpec::string("companyName").length(1, 64),
    FieldSpec::string("address1"),
    FieldSpec::string("address2"),
    FieldSpec::string("city"),
    FieldSpec::string("state"),
    FieldSpec::string("country"),
    FieldSpec::string("zipCode"),
];

/// The single branch declaration. Order here is the order violations are reported in.
pub const BRANCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("tenantId").length(1, 64).required(),
    FieldSpec::string("entityCode")
        .length(1, 50)
        .pattern(Pattern::AlphanumericHyphen)
        .required()
        .unique(),
    FieldSpec::string("name")
        .length(1, 50)
        .pattern(Pattern::AlphanumericHyphen)
        .required(),
    FieldSpec::integer("level").required(),
    FieldSpec::string("description")
        .length(1, 255)
        .pattern(Pattern::AlphanumericSpaceHyphen)
        .required(),
    FieldSpec::boolean("enable").default_value(FieldDefault::Bool(true)),
    FieldSpec::string("processingStatus").required(),
    FieldSpec::string("createdBy").required(),
    FieldSpec::date_time("createdDate").required(),
    FieldSpec::string("parent")
        .pattern(Pattern::AlphanumericHyphen)
        .required(),
    // Optional at both layers; see DESIGN.md.
    FieldSpec::object("contact", CONTACT_FIELDS),
];

/// Field rules evaluated by the schema validator.
pub fn validation_view() -> &'static [FieldSpec] {
    BRANCH_FIELDS
}

/// Storage-side view: required fields, unique fields and insert defaults.
pub fn persistence_view() -> CollectionSpec {
    let mut spec = CollectionSpec::new(BRANCH_COLLECTION);
    for field in BRANCH_FIELDS {
        if field.required {
            spec.required.push(field.name);
        }
        if field.unique {
            spec.unique.push(field.name);
        }
        if let Some(default) = field.default {
            spec.defaults.push((field.name, default.to_json()));
        }
    }
    spec
}

/// Reads a JSON number as `i64`, accepting floats with no fractional part.
pub(crate) fn integral(value: &Value) -> Option<i64> {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|float| float.fract() == 0.0 && float.abs() < I64_BOUND)
            .map(|float| float as i64)
    })
}

/// Resolves a dotted path such as `contact.city` to its field declaration.
pub fn field_at(path: &str) -> Option<&'static FieldSpec> {
    let mut fields = BRANCH_FIELDS;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let field = fields.iter().find(|field| field.name == segment)?;
        if segments.peek().is_none() {
            return Some(field);
        }
        match field.kind {
            FieldKind::Object(nested) => fields = nested,
            _ => return None,
        }
    }
    None
}

/// Casts a lookup value to the declared type of the field at `path`.
///
/// Values that cannot be cast, and paths outside the schema, are returned
/// unchanged and therefore only match stored values of the same JSON type.
pub fn cast_filter_value(path: &str, value: &Value) -> Value {
    let Some(field) = field_at(path) else {
        return value.clone();
    };
    let cast = match (field.kind, value) {
        (FieldKind::Integer, Value::String(text)) => text.trim().parse::<i64>().ok().map(Value::from),
        (FieldKind::Integer, Value::Number(_)) => integral(value).map(Value::from),
        (FieldKind::Boolean, Value::String(text)) => match text.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldKind::String | FieldKind::DateTime, Value::Number(number)) => {
            Some(Value::String(number.to_string()))
        }
        (FieldKind::String | FieldKind::DateTime, Value::Bool(flag)) => {
            Some(Value::String(flag.to_string()))
        }
        _ => None,
    };
    cast.unwrap_or_else(|| value.clone())
}
