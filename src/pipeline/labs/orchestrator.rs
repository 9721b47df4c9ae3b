//! Lab report ingestion: validate → resolve patient → extract → map →
//! normalize → fingerprint → duplicate check → persist → project.
//!
//! Pure pipeline logic with trait-based DI. The duplicate pre-check only
//! saves work; the repository's uniqueness rule decides races, and both
//! paths end in the same conflict.

use std::sync::Arc;

use uuid::Uuid;

use super::error::{IngestError, Violation};
use super::fingerprint::generate_fingerprint;
use super::mapper::map_extracted_to_domain;
use super::projection::{to_output, to_summary, LabReportOutput, LabReportSummaryOutput};
use super::types::{
    CreateFromDocumentInput, IngestStage, LabRepository, PatientLookup, SUPPORTED_MIME_TYPES,
};
use crate::db::DatabaseError;
use crate::models::{LabDomainError, LabResultItemTimeline};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::extraction::{DocumentExtractor, ExtractionError};

const OP_CREATE: &str = "create_from_document";
const OP_GET: &str = "get";
const OP_LIST: &str = "list";
const OP_LIST_FULL: &str = "list_full";
const OP_TIMELINE: &str = "parameter_timeline";

pub struct LabIngestor {
    patients: Arc<dyn PatientLookup>,
    extractor: Arc<dyn DocumentExtractor>,
    repository: Arc<dyn LabRepository>,
}

impl LabIngestor {
    pub fn new(
        patients: Arc<dyn PatientLookup>,
        extractor: Arc<dyn DocumentExtractor>,
        repository: Arc<dyn LabRepository>,
    ) -> Self {
        Self {
            patients,
            extractor,
            repository,
        }
    }

    /// Ingest one document and return the stored report.
    ///
    /// Nothing is written unless every stage before persisting succeeds.
    /// A report whose measurements match one already stored for the same
    /// patient is rejected with `IngestError::AlreadyExists`.
    pub fn execute(
        &self,
        input: &CreateFromDocumentInput,
        cancel: &CancelToken,
    ) -> Result<LabReportOutput, IngestError> {
        let _span = tracing::info_span!(
            "ingest_lab_report",
            patient_id = %input.patient_id,
            mime_type = %input.mime_type
        )
        .entered();

        checkpoint(cancel, IngestStage::Validating)?;
        validate_create(input)?;

        checkpoint(cancel, IngestStage::ResolvingPatient)?;
        self.require_patient(OP_CREATE, &input.patient_id)?;

        checkpoint(cancel, IngestStage::Extracting)?;
        let mime_type = input.mime_type.trim().to_lowercase();
        let document = self
            .extractor
            .extract_lab_report(input.document_uri.trim(), &mime_type, cancel)
            .map_err(|e| match e {
                ExtractionError::Cancelled => IngestError::Cancelled {
                    operation: OP_CREATE,
                    stage: IngestStage::Extracting,
                },
                other => {
                    tracing::warn!(
                        document_uri = %input.document_uri,
                        error = %other,
                        "Lab extraction failed"
                    );
                    IngestError::Extraction {
                        operation: OP_CREATE,
                        document_uri: input.document_uri.clone(),
                        source: other,
                    }
                }
            })?;

        checkpoint(cancel, IngestStage::Mapping)?;
        let mut report =
            map_extracted_to_domain(input.patient_id, input.uploaded_by_user_id, &document)
                .map_err(domain_error)?;
        report.normalize();

        checkpoint(cancel, IngestStage::Fingerprinting)?;
        let fingerprint = generate_fingerprint(&input.patient_id, &report);
        tracing::debug!(
            fingerprint = %fingerprint,
            results = report.test_results.len(),
            items = report.item_count(),
            "Lab report mapped"
        );

        checkpoint(cancel, IngestStage::CheckingDuplicate)?;
        let exists = self
            .repository
            .exists_by_fingerprint(&input.patient_id, &fingerprint)
            .map_err(|e| internal(OP_CREATE, "checking fingerprint", e))?;
        if exists {
            tracing::warn!(fingerprint = %fingerprint, "Duplicate lab report rejected");
            return Err(already_exists(input.patient_id, fingerprint));
        }

        checkpoint(cancel, IngestStage::Persisting)?;
        report.fingerprint = Some(fingerprint.clone());
        match self.repository.create(&report) {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    "Duplicate lab report rejected by storage"
                );
                return Err(already_exists(input.patient_id, fingerprint));
            }
            Err(e) => return Err(internal(OP_CREATE, "persisting report", e)),
        }

        tracing::info!(
            report_id = %report.id,
            stage = %IngestStage::Done,
            results = report.test_results.len(),
            items = report.item_count(),
            "Lab report ingested"
        );
        Ok(to_output(&report))
    }

    /// One stored report, full view.
    pub fn get(&self, report_id: &Uuid) -> Result<LabReportOutput, IngestError> {
        if report_id.is_nil() {
            return Err(IngestError::Validation {
                operation: OP_GET,
                violations: vec![Violation::new("report_id", "required")],
            });
        }
        let report = self
            .repository
            .find_by_id(report_id)
            .map_err(|e| internal(OP_GET, "loading report", e))?
            .ok_or(IngestError::ReportNotFound {
                operation: OP_GET,
                report_id: *report_id,
            })?;
        Ok(to_output(&report))
    }

    /// Summaries of a patient's reports, newest first.
    pub fn list_summaries(
        &self,
        patient_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LabReportSummaryOutput>, IngestError> {
        let (limit, offset) = validate_page(OP_LIST, patient_id, limit, offset, Vec::new())?;
        self.require_patient(OP_LIST, patient_id)?;

        let reports = self
            .repository
            .list_by_patient(patient_id, limit, offset)
            .map_err(|e| internal(OP_LIST, "listing reports", e))?;
        Ok(reports.iter().map(to_summary).collect())
    }

    /// Full views of a patient's reports, newest first.
    pub fn list_full(
        &self,
        patient_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LabReportOutput>, IngestError> {
        let (limit, offset) = validate_page(OP_LIST_FULL, patient_id, limit, offset, Vec::new())?;
        self.require_patient(OP_LIST_FULL, patient_id)?;

        let reports = self
            .repository
            .list_by_patient(patient_id, limit, offset)
            .map_err(|e| internal(OP_LIST_FULL, "listing reports", e))?;
        Ok(reports.iter().map(to_output).collect())
    }

    /// History of one parameter across a patient's reports, newest first.
    pub fn parameter_timeline(
        &self,
        patient_id: &Uuid,
        parameter_name: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LabResultItemTimeline>, IngestError> {
        let mut violations = Vec::new();
        if parameter_name.trim().is_empty() {
            violations.push(Violation::new("parameter_name", "required"));
        }
        let (limit, offset) = validate_page(OP_TIMELINE, patient_id, limit, offset, violations)?;
        self.require_patient(OP_TIMELINE, patient_id)?;

        self.repository
            .list_items_by_parameter(patient_id, parameter_name.trim(), limit, offset)
            .map_err(|e| internal(OP_TIMELINE, "listing parameter history", e))
    }

    fn require_patient(&self, operation: &'static str, patient_id: &Uuid) -> Result<(), IngestError> {
        match self.patients.find_patient(patient_id) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(IngestError::PatientNotFound {
                operation,
                patient_id: *patient_id,
            }),
            Err(e) => Err(internal(operation, "resolving patient", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn checkpoint(cancel: &CancelToken, stage: IngestStage) -> Result<(), IngestError> {
    if cancel.is_cancelled() {
        tracing::info!(stage = %stage, "Lab ingestion cancelled");
        return Err(IngestError::Cancelled {
            operation: OP_CREATE,
            stage,
        });
    }
    Ok(())
}

fn validate_create(input: &CreateFromDocumentInput) -> Result<(), IngestError> {
    let mut violations = Vec::new();

    if input.patient_id.is_nil() {
        violations.push(Violation::new("patient_id", "required"));
    }
    if input.uploaded_by_user_id.is_nil() {
        violations.push(Violation::new("uploaded_by_user_id", "required"));
    }
    if input.document_uri.trim().is_empty() {
        violations.push(Violation::new("document_uri", "required"));
    }
    let mime_type = input.mime_type.trim().to_lowercase();
    if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
        violations.push(Violation::new("mime_type", "unsupported"));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(IngestError::Validation {
            operation: OP_CREATE,
            violations,
        })
    }
}

fn validate_page(
    operation: &'static str,
    patient_id: &Uuid,
    limit: i64,
    offset: i64,
    mut violations: Vec<Violation>,
) -> Result<(u32, u32), IngestError> {
    if patient_id.is_nil() {
        violations.push(Violation::new("patient_id", "required"));
    }
    if limit <= 0 {
        violations.push(Violation::new("limit", "must be greater than zero"));
    }
    if offset < 0 {
        violations.push(Violation::new("offset", "must not be negative"));
    }

    if violations.is_empty() {
        Ok((
            u32::try_from(limit).unwrap_or(u32::MAX),
            u32::try_from(offset).unwrap_or(u32::MAX),
        ))
    } else {
        Err(IngestError::Validation {
            operation,
            violations,
        })
    }
}

fn domain_error(err: LabDomainError) -> IngestError {
    tracing::warn!(field = err.field(), error = %err, "Lab report mapping rejected");
    IngestError::Validation {
        operation: OP_CREATE,
        violations: vec![Violation::new(err.field(), err.to_string())],
    }
}

fn already_exists(patient_id: Uuid, fingerprint: String) -> IngestError {
    IngestError::AlreadyExists {
        operation: OP_CREATE,
        patient_id,
        fingerprint,
    }
}

fn internal(operation: &'static str, context: &str, source: DatabaseError) -> IngestError {
    tracing::error!(operation, context, error = %source, "Lab ingestion internal error");
    IngestError::Internal {
        operation,
        context: context.to_string(),
        source,
    }
}
