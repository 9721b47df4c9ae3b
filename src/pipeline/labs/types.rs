use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{LabReport, LabResultItemTimeline, Patient};

/// Document formats the extraction service accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

/// Request to ingest one uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFromDocumentInput {
    pub patient_id: Uuid,
    pub document_uri: String,
    pub mime_type: String,
    pub uploaded_by_user_id: Uuid,
}

/// Position of an ingestion in its pipeline. Reported on cancellation and
/// recorded on the ingestion span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Validating,
    ResolvingPatient,
    Extracting,
    Mapping,
    Fingerprinting,
    CheckingDuplicate,
    Persisting,
    Done,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::ResolvingPatient => "resolving_patient",
            Self::Extracting => "extracting",
            Self::Mapping => "mapping",
            Self::Fingerprinting => "fingerprinting",
            Self::CheckingDuplicate => "checking_duplicate",
            Self::Persisting => "persisting",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════
// Collaborator capabilities
// ═══════════════════════════════════════════

/// Patient existence check.
pub trait PatientLookup: Send + Sync {
    fn find_patient(&self, id: &Uuid) -> Result<Option<Patient>, DatabaseError>;
}

/// Lab report storage.
///
/// `create` must be atomic for the whole tree and must reject a second
/// report with the same (patient_id, fingerprint) with
/// `DatabaseError::UniqueViolation`, even when racing another writer.
pub trait LabRepository: Send + Sync {
    fn exists_by_fingerprint(
        &self,
        patient_id: &Uuid,
        fingerprint: &str,
    ) -> Result<bool, DatabaseError>;

    fn create(&self, report: &LabReport) -> Result<(), DatabaseError>;

    fn find_by_id(&self, id: &Uuid) -> Result<Option<LabReport>, DatabaseError>;

    /// Full report trees, newest first.
    fn list_by_patient(
        &self,
        patient_id: &Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabReport>, DatabaseError>;

    /// One parameter's measurements across reports, newest first.
    fn list_items_by_parameter(
        &self,
        patient_id: &Uuid,
        parameter_name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabResultItemTimeline>, DatabaseError>;
}
