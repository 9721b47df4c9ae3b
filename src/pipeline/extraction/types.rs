use serde::{Deserialize, Deserializer, Serialize};

use super::ExtractionError;
use crate::pipeline::cancel::CancelToken;

// ═══════════════════════════════════════════
// Entity graph as returned by the extraction service
// ═══════════════════════════════════════════

/// Processed document: full OCR text plus typed entities.
/// Accepts both snake_case and the service's camelCase field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl ExtractedDocument {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default, alias = "mentionText", skip_serializing_if = "Option::is_none")]
    pub mention_text: Option<String>,
    #[serde(default, alias = "normalizedValue", skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<NormalizedValue>,
    #[serde(default, alias = "textAnchor", skip_serializing_if = "Option::is_none")]
    pub text_anchor: Option<TextAnchor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Entity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedValue {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAnchor {
    #[serde(default, alias = "textSegments")]
    pub text_segments: Vec<TextSegment>,
}

/// Byte range into `ExtractedDocument::text`. The service encodes 64-bit
/// integers as JSON strings and omits zero values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    #[serde(default, alias = "startIndex", deserialize_with = "de_index")]
    pub start_index: usize,
    #[serde(default, alias = "endIndex", deserialize_with = "de_index")]
    pub end_index: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexRepr {
    Number(u64),
    Text(String),
}

fn de_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    match IndexRepr::deserialize(deserializer)? {
        IndexRepr::Number(n) => usize::try_from(n).map_err(serde::de::Error::custom),
        IndexRepr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ═══════════════════════════════════════════
// Flattened lab-report fields read from the graph
// ═══════════════════════════════════════════

/// Lab report fields as raw strings, before any validation or date parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedLabReport {
    pub patient_name: Option<String>,
    pub patient_dob: Option<String>,
    pub lab_name: Option<String>,
    pub lab_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub requesting_doctor: Option<String>,
    pub technical_manager: Option<String>,
    pub report_date: Option<String>,
    pub raw_text: Option<String>,
    pub test_results: Vec<ExtractedTestResult>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTestResult {
    pub test_name: String,
    pub material: Option<String>,
    pub method: Option<String>,
    pub collected_at: Option<String>,
    pub release_at: Option<String>,
    pub items: Vec<ExtractedTestItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTestItem {
    pub parameter_name: String,
    pub result_value: Option<String>,
    pub unit: Option<String>,
    pub reference_text: Option<String>,
}

// ═══════════════════════════════════════════
// Extractor capability
// ═══════════════════════════════════════════

/// Turns a stored document into an entity graph.
pub trait DocumentExtractor: Send + Sync {
    fn extract_lab_report(
        &self,
        document_uri: &str,
        mime_type: &str,
        cancel: &CancelToken,
    ) -> Result<ExtractedDocument, ExtractionError>;
}
