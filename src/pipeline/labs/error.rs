//! Error taxonomy for lab ingestion as seen by callers.
//!
//! Every failure carries the operation name and the identifiers involved.
//! `kind()` is the stable classification a transport layer maps to status
//! codes; `public_message()` is safe to show to end users.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::types::IngestStage;
use crate::db::DatabaseError;
use crate::pipeline::extraction::ExtractionError;

/// One offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    External,
    Internal,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{operation}: invalid input: {}", join_violations(.violations))]
    Validation {
        operation: &'static str,
        violations: Vec<Violation>,
    },

    #[error("{operation}: patient {patient_id} not found")]
    PatientNotFound {
        operation: &'static str,
        patient_id: Uuid,
    },

    #[error("{operation}: lab report {report_id} not found")]
    ReportNotFound {
        operation: &'static str,
        report_id: Uuid,
    },

    #[error("{operation}: lab report already exists for patient {patient_id} (fingerprint {fingerprint})")]
    AlreadyExists {
        operation: &'static str,
        patient_id: Uuid,
        fingerprint: String,
    },

    #[error("{operation}: extraction failed for {document_uri}: {source}")]
    Extraction {
        operation: &'static str,
        document_uri: String,
        #[source]
        source: ExtractionError,
    },

    #[error("{operation}: {context}: {source}")]
    Internal {
        operation: &'static str,
        context: String,
        #[source]
        source: DatabaseError,
    },

    #[error("{operation}: cancelled before {stage}")]
    Cancelled {
        operation: &'static str,
        stage: IngestStage,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::PatientNotFound { .. } | Self::ReportNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::Conflict,
            Self::Extraction { .. } => ErrorKind::External,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Validation { operation, .. }
            | Self::PatientNotFound { operation, .. }
            | Self::ReportNotFound { operation, .. }
            | Self::AlreadyExists { operation, .. }
            | Self::Extraction { operation, .. }
            | Self::Internal { operation, .. }
            | Self::Cancelled { operation, .. } => *operation,
        }
    }

    /// Machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "ALREADY_EXISTS",
            ErrorKind::External => "EXTRACTION_FAILED",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }

    /// Message for end users. Internal and upstream details are replaced by
    /// generic text; the pipeline logs them where they occur.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation { violations, .. } => {
                format!("Invalid input: {}", join_violations(violations))
            }
            Self::PatientNotFound { .. } => "Patient not found".to_string(),
            Self::ReportNotFound { .. } => "Lab report not found".to_string(),
            Self::AlreadyExists { .. } => {
                "This lab report has already been uploaded for this patient".to_string()
            }
            Self::Extraction { .. } => {
                "The document could not be processed, try again later".to_string()
            }
            Self::Internal { .. } => "An internal error occurred".to_string(),
            Self::Cancelled { .. } => "The request was cancelled".to_string(),
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Structured body for transports.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                kind: self.kind(),
                message: self.public_message(),
                violations: self.violations().to_vec(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        let id = Uuid::new_v4();
        let cases = [
            (
                IngestError::Validation {
                    operation: "create",
                    violations: vec![Violation::new("patient_id", "is required")],
                },
                ErrorKind::Validation,
            ),
            (
                IngestError::PatientNotFound {
                    operation: "create",
                    patient_id: id,
                },
                ErrorKind::NotFound,
            ),
            (
                IngestError::AlreadyExists {
                    operation: "create",
                    patient_id: id,
                    fingerprint: "ab".into(),
                },
                ErrorKind::Conflict,
            ),
            (
                IngestError::Extraction {
                    operation: "create",
                    document_uri: "gs://b/x.pdf".into(),
                    source: ExtractionError::Timeout(30),
                },
                ErrorKind::External,
            ),
            (
                IngestError::Internal {
                    operation: "create",
                    context: "persist".into(),
                    source: DatabaseError::LockPoisoned,
                },
                ErrorKind::Internal,
            ),
            (
                IngestError::Cancelled {
                    operation: "create",
                    stage: IngestStage::Extracting,
                },
                ErrorKind::Cancelled,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
            assert_eq!(err.operation(), "create");
        }
    }

    #[test]
    fn validation_lists_every_violation() {
        let err = IngestError::Validation {
            operation: "create_from_document",
            violations: vec![
                Violation::new("patient_id", "is required"),
                Violation::new("mime_type", "is not supported"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("patient_id is required"));
        assert!(text.contains("mime_type is not supported"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn internal_details_stay_out_of_public_message() {
        let err = IngestError::Internal {
            operation: "create_from_document",
            context: "persisting report".into(),
            source: DatabaseError::MigrationFailed {
                version: 1,
                reason: "disk I/O error at /var/secret".into(),
            },
        };
        assert!(err.to_string().contains("/var/secret"));
        assert!(!err.public_message().contains("secret"));
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn extraction_details_stay_out_of_public_message() {
        let err = IngestError::Extraction {
            operation: "create_from_document",
            document_uri: "gs://bucket/a.pdf".into(),
            source: ExtractionError::ServiceError {
                status: 500,
                body: "stack trace".into(),
            },
        };
        assert!(!err.public_message().contains("stack trace"));
    }

    #[test]
    fn body_serializes_code_and_violations() {
        let err = IngestError::Validation {
            operation: "list",
            violations: vec![Violation::new("limit", "must be greater than zero")],
        };
        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["kind"], "validation");
        assert_eq!(json["error"]["violations"][0]["field"], "limit");

        let conflict = IngestError::AlreadyExists {
            operation: "create",
            patient_id: Uuid::new_v4(),
            fingerprint: "ff".into(),
        };
        let json = serde_json::to_value(conflict.to_body()).unwrap();
        assert_eq!(json["error"]["code"], "ALREADY_EXISTS");
        assert!(json["error"].get("violations").is_none());
    }
}
