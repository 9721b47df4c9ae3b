//! Builds the lab report domain tree from an extracted entity graph.
//!
//! Partial extraction is normal: a date that cannot be parsed leaves the
//! field empty. A result or item without a name cannot be stored, so it
//! fails the whole mapping.

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use super::temporal::{parse_date, parse_date_time, DateFormatError};
use crate::models::{LabDomainError, LabReport, LabResult, LabResultItem};
use crate::pipeline::extraction::{read_lab_report, ExtractedDocument, ExtractedLabReport};

/// Map an extraction graph to an un-normalized `LabReport`. No I/O.
pub fn map_extracted_to_domain(
    patient_id: Uuid,
    uploaded_by: Uuid,
    document: &ExtractedDocument,
) -> Result<LabReport, LabDomainError> {
    if document.is_empty() {
        return Err(LabDomainError::EmptyExtraction);
    }
    build_lab_report(patient_id, uploaded_by, &read_lab_report(document))
}

/// Build the domain tree from fields already read out of the graph.
pub fn build_lab_report(
    patient_id: Uuid,
    uploaded_by: Uuid,
    extracted: &ExtractedLabReport,
) -> Result<LabReport, LabDomainError> {
    let mut report = LabReport::new(patient_id, uploaded_by)?;

    report.patient_name = extracted.patient_name.clone();
    report.lab_name = extracted.lab_name.clone();
    report.lab_phone = extracted.lab_phone.clone();
    report.insurance_provider = extracted.insurance_provider.clone();
    report.requesting_doctor = extracted.requesting_doctor.clone();
    report.technical_manager = extracted.technical_manager.clone();
    report.raw_text = extracted.raw_text.clone();

    report.patient_dob = lenient("patient_dob", extracted.patient_dob.as_deref(), parse_date);
    report.report_date = lenient("report_date", extracted.report_date.as_deref(), parse_date);

    for test in &extracted.test_results {
        let mut result = LabResult::new(report.id, &test.test_name)?;
        result.material = test.material.clone();
        result.method = test.method.clone();
        result.collected_at =
            lenient("collected_at", test.collected_at.as_deref(), parse_date_time);
        result.release_at = lenient("release_at", test.release_at.as_deref(), parse_date_time);

        for extracted_item in &test.items {
            let mut item = LabResultItem::new(result.id, &extracted_item.parameter_name)?;
            item.result_value = extracted_item.result_value.clone();
            item.result_unit = extracted_item.unit.clone();
            item.reference_text = extracted_item.reference_text.clone();
            result.items.push(item);
        }

        report.test_results.push(result);
    }

    Ok(report)
}

fn lenient(
    field: &'static str,
    raw: Option<&str>,
    parse: fn(&str) -> Result<DateTime<FixedOffset>, DateFormatError>,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw?;
    match parse(raw) {
        Ok(dt) => Some(dt),
        Err(e) => {
            tracing::debug!(field, error = %e, "Dropping unparseable date");
            None
        }
    }
}
