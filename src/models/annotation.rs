//! Annotation result model.

use serde::{Deserialize, Serialize};

/// Annotation returned by the lookup service for a single identifier.
///
/// Results are keyed by identifier within a session; storing the same
/// identifier again replaces the earlier row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResult {
    /// The looked-up identifier (e.g. `rs429358`).
    pub identifier: String,
    /// Most severe predicted consequence (e.g. `missense_variant`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consequence: Option<String>,
    /// Gene symbol of the reported transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,
    /// Full record as returned by the service.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AnnotationResult {
    /// A result with no annotation fields beyond the identifier.
    pub fn bare(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            consequence: None,
            gene: None,
            transcript_id: None,
            payload: serde_json::Value::Null,
        }
    }
}
