//! Hydra (JSON-LD) envelopes used by the Mail.tm API.

use serde::{Deserialize, Serialize};

/// Paginated collection wrapper returned by list endpoints.
///
/// Every field is optional: the API omits `hydra:member` for some empty
/// collections and pagination metadata is not guaranteed. Item types need
/// not implement `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraCollection<T> {
    /// JSON-LD `@context`.
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// JSON-LD `@id`.
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// JSON-LD `@type`, usually `hydra:Collection`.
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Items on the current page.
    #[serde(rename = "hydra:member", skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<T>>,
    /// Total number of items across all pages.
    #[serde(rename = "hydra:totalItems", default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl<T> HydraCollection<T> {
    /// Consume the envelope, returning its items (empty when absent).
    pub fn into_members(self) -> Vec<T> {
        self.members.unwrap_or_default()
    }
}

/// Structured error document returned by the API.
///
/// The four top-level string fields are required; a body that lacks any of
/// them is not treated as a structured error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraError {
    /// JSON-LD `@context`.
    #[serde(rename = "@context")]
    pub context: String,
    /// JSON-LD `@type`, e.g. `hydra:Error` or `ConstraintViolationList`.
    #[serde(rename = "@type")]
    pub kind: String,
    /// Short summary, usually "An error occurred".
    #[serde(rename = "hydra:title")]
    pub title: String,
    /// Human readable explanation.
    #[serde(rename = "hydra:description")]
    pub description: String,
    /// Field-level failures for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Request field the failure refers to.
    #[serde(default)]
    pub property_path: Option<String>,
    /// Human readable failure message.
    #[serde(default)]
    pub message: Option<String>,
    /// Validator code identifying the rule that failed.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_without_members_is_empty() {
        let collection: HydraCollection<String> =
            serde_json::from_str(r#"{"@context":"/contexts/Domain","hydra:totalItems":0}"#)
                .unwrap();
        assert_eq!(collection.total_items, Some(0));
        assert!(collection.into_members().is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct Item {
        id: String,
    }

    fn parse_page<T: serde::de::DeserializeOwned>(body: &str) -> HydraCollection<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn collection_of_items_without_default() {
        let page: HydraCollection<Item> = parse_page(r#"{"hydra:member":[{"id":"d1"}]}"#);
        let members = page.into_members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "d1");

        let empty: HydraCollection<Item> = parse_page(r#"{"hydra:totalItems":0}"#);
        assert!(empty.into_members().is_empty());
    }

    #[test]
    fn collection_with_null_members_is_empty() {
        let collection: HydraCollection<String> =
            serde_json::from_str(r#"{"hydra:member":null}"#).unwrap();
        assert!(collection.into_members().is_empty());
    }

    #[test]
    fn hydra_error_requires_description() {
        let missing = r#"{"@context":"/contexts/Error","@type":"hydra:Error","hydra:title":"An error occurred"}"#;
        assert!(serde_json::from_str::<HydraError>(missing).is_err());
    }

    #[test]
    fn hydra_error_parses_violations() {
        let body = r#"{
            "@context": "/contexts/ConstraintViolationList",
            "@type": "ConstraintViolationList",
            "hydra:title": "An error occurred",
            "hydra:description": "address: This value is not valid.",
            "violations": [{"propertyPath": "address", "message": "This value is not valid.", "code": "bd79c0ab"}]
        }"#;
        let err: HydraError = serde_json::from_str(body).unwrap();
        let violations = err.violations.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property_path.as_deref(), Some("address"));
        assert_eq!(violations[0].code.as_deref(), Some("bd79c0ab"));
    }
}
