use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Construction failures for the lab report tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabDomainError {
    #[error("patient id is required")]
    InvalidPatientId,

    #[error("uploaded by user id is required")]
    InvalidUploadedBy,

    #[error("missing parent id")]
    MissingId,

    #[error("test name is required")]
    InvalidTestName,

    #[error("parameter name is required")]
    InvalidParameterName,

    #[error("extracted document is empty")]
    EmptyExtraction,
}

impl LabDomainError {
    /// Input field the failure is attributed to, for validation reporting.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidPatientId => "patient_id",
            Self::InvalidUploadedBy => "uploaded_by_user_id",
            Self::MissingId => "id",
            Self::InvalidTestName => "test_result.test_name",
            Self::InvalidParameterName => "test_item.parameter_name",
            Self::EmptyExtraction => "document",
        }
    }
}

/// One ingested lab document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,

    pub patient_name: Option<String>,
    pub patient_dob: Option<DateTime<FixedOffset>>,
    pub lab_name: Option<String>,
    pub lab_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub requesting_doctor: Option<String>,
    pub technical_manager: Option<String>,
    pub report_date: Option<DateTime<FixedOffset>>,
    pub raw_text: Option<String>,
    pub fingerprint: Option<String>,

    pub test_results: Vec<LabResult>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabReport {
    /// Empty report bound to its patient and uploader. Optional metadata is
    /// filled by the caller afterwards.
    pub fn new(patient_id: Uuid, uploaded_by: Uuid) -> Result<Self, LabDomainError> {
        if patient_id.is_nil() {
            return Err(LabDomainError::InvalidPatientId);
        }
        if uploaded_by.is_nil() {
            return Err(LabDomainError::InvalidUploadedBy);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            patient_id,
            uploaded_by,
            patient_name: None,
            patient_dob: None,
            lab_name: None,
            lab_phone: None,
            insurance_provider: None,
            requesting_doctor: None,
            technical_manager: None,
            report_date: None,
            raw_text: None,
            fingerprint: None,
            test_results: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn item_count(&self) -> usize {
        self.test_results.iter().map(|r| r.items.len()).sum()
    }
}

/// One panel or test within a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub id: Uuid,
    pub lab_report_id: Uuid,

    pub test_name: String,
    pub material: Option<String>,
    pub method: Option<String>,

    pub collected_at: Option<DateTime<FixedOffset>>,
    pub release_at: Option<DateTime<FixedOffset>>,

    pub items: Vec<LabResultItem>,
}

impl LabResult {
    pub fn new(lab_report_id: Uuid, test_name: &str) -> Result<Self, LabDomainError> {
        if lab_report_id.is_nil() {
            return Err(LabDomainError::MissingId);
        }
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(LabDomainError::InvalidTestName);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            lab_report_id,
            test_name: test_name.to_string(),
            material: None,
            method: None,
            collected_at: None,
            release_at: None,
            items: Vec::new(),
        })
    }
}

/// One measured parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResultItem {
    pub id: Uuid,
    pub lab_result_id: Uuid,

    pub parameter_name: String,
    pub result_value: Option<String>,
    pub result_unit: Option<String>,
    pub reference_text: Option<String>,
}

impl LabResultItem {
    pub fn new(lab_result_id: Uuid, parameter_name: &str) -> Result<Self, LabDomainError> {
        if lab_result_id.is_nil() {
            return Err(LabDomainError::MissingId);
        }
        let parameter_name = parameter_name.trim();
        if parameter_name.is_empty() {
            return Err(LabDomainError::InvalidParameterName);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            lab_result_id,
            parameter_name: parameter_name.to_string(),
            result_value: None,
            result_unit: None,
            reference_text: None,
        })
    }
}

/// Lookup key for a parameter name: trimmed and Unicode-lowercased, so
/// "HEMÁCIAS" and "Hemácias" name the same parameter.
pub fn parameter_key(parameter_name: &str) -> String {
    parameter_name.trim().to_lowercase()
}

/// A single parameter's measurement, flattened with its report context.
/// Read model for parameter history across reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResultItemTimeline {
    pub report_id: Uuid,
    pub lab_result_id: Uuid,
    pub item_id: Uuid,
    pub report_date: Option<DateTime<FixedOffset>>,
    pub collected_at: Option<DateTime<FixedOffset>>,
    pub test_name: String,
    pub parameter_name: String,
    pub result_value: Option<String>,
    pub result_unit: Option<String>,
}
