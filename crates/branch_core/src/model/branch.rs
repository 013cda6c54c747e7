//! Branch domain model.
//!
//! # Invariants
//! - `entity_code` is unique across all branches (enforced by storage).
//! - `parent` is a soft reference to another branch's `entity_code`; it is not
//!   checked for existence.
//! - `id` is assigned by storage on insert and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage-assigned branch identifier.
pub type BranchId = Uuid;

/// Tenant-scoped organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Owning tenant. Scopes the record but is not unique.
    pub tenant_id: String,
    /// External identifier, unique across all branches.
    pub entity_code: String,
    pub name: String,
    /// Hierarchy depth.
    pub level: i64,
    pub description: String,
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Opaque workflow label such as `authorized`.
    pub processing_status: String,
    pub created_by: String,
    pub created_date: DateTime<Utc>,
    /// `entity_code` of the parent branch.
    pub parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

/// Contact details embedded in a branch. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fax_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// A persisted branch together with its storage identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    #[serde(rename = "_id")]
    pub id: BranchId,
    #[serde(flatten)]
    pub branch: Branch,
}

fn default_enable() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::{Branch, BranchRecord};
    use serde_json::json;

    #[test]
    fn record_decodes_from_stored_document_and_defaults_enable() {
        let record: BranchRecord = serde_json::from_value(json!({
            "_id": "6f1c2a7e-3f7b-4d8a-9a43-0c7d2f1e9b10",
            "tenantId": "IVL",
            "entityCode": "entity1",
            "name": "entity1",
            "level": 1,
            "description": "entity1 description",
            "processingStatus": "authorized",
            "createdBy": "SYSTEM",
            "createdDate": "2024-01-02T03:04:05Z",
            "parent": "entityparent1",
            "unknownField": "dropped"
        }))
        .unwrap();

        assert_eq!(record.branch.entity_code, "entity1");
        assert!(record.branch.enable);
        assert!(record.branch.contact.is_none());
    }

    #[test]
    fn branch_serializes_with_camel_case_keys() {
        let branch: Branch = serde_json::from_value(json!({
            "tenantId": "IVL",
            "entityCode": "entity1",
            "name": "entity1",
            "level": 2,
            "description": "d",
            "enable": false,
            "processingStatus": "authorized",
            "createdBy": "SYSTEM",
            "createdDate": "2024-01-02T03:04:05Z",
            "parent": "p1",
            "contact": { "city": "Bangalore", "zipCode": "6868" }
        }))
        .unwrap();

        let value = serde_json::to_value(&branch).unwrap();
        assert_eq!(value["entityCode"], "entity1");
        assert_eq!(value["contact"]["zipCode"], "6868");
        assert!(value["contact"].get("email").is_none());
    }
}
