//! Read views of a stored lab report: the full tree and a compact summary
//! for list screens. Pure copies, no lookups.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{LabReport, LabResult, LabResultItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabReportOutput {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: Option<String>,
    pub patient_dob: Option<DateTime<FixedOffset>>,
    pub lab_name: Option<String>,
    pub lab_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub requesting_doctor: Option<String>,
    pub technical_manager: Option<String>,
    pub report_date: Option<DateTime<FixedOffset>>,
    pub uploaded_by_user_id: Uuid,
    pub fingerprint: Option<String>,
    pub test_results: Vec<TestResultOutput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResultOutput {
    pub id: Uuid,
    pub test_name: String,
    pub material: Option<String>,
    pub method: Option<String>,
    pub collected_at: Option<DateTime<FixedOffset>>,
    pub release_at: Option<DateTime<FixedOffset>>,
    pub items: Vec<TestItemOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestItemOutput {
    pub id: Uuid,
    pub parameter_name: String,
    pub result_value: Option<String>,
    pub result_unit: Option<String>,
    pub reference_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabReportSummaryOutput {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<DateTime<FixedOffset>>,
    pub summary_tests: Vec<LabResultSummaryOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabResultSummaryOutput {
    pub test_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<FixedOffset>>,
    pub key_results: Vec<ResultItemSummaryOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItemSummaryOutput {
    pub parameter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_unit: Option<String>,
}

pub fn to_output(report: &LabReport) -> LabReportOutput {
    LabReportOutput {
        id: report.id,
        patient_id: report.patient_id,
        patient_name: report.patient_name.clone(),
        patient_dob: report.patient_dob,
        lab_name: report.lab_name.clone(),
        lab_phone: report.lab_phone.clone(),
        insurance_provider: report.insurance_provider.clone(),
        requesting_doctor: report.requesting_doctor.clone(),
        technical_manager: report.technical_manager.clone(),
        report_date: report.report_date,
        uploaded_by_user_id: report.uploaded_by,
        fingerprint: report.fingerprint.clone(),
        test_results: report.test_results.iter().map(result_output).collect(),
        created_at: report.created_at,
        updated_at: report.updated_at,
    }
}

fn result_output(result: &LabResult) -> TestResultOutput {
    TestResultOutput {
        id: result.id,
        test_name: result.test_name.clone(),
        material: result.material.clone(),
        method: result.method.clone(),
        collected_at: result.collected_at,
        release_at: result.release_at,
        items: result.items.iter().map(item_output).collect(),
    }
}

fn item_output(item: &LabResultItem) -> TestItemOutput {
    TestItemOutput {
        id: item.id,
        parameter_name: item.parameter_name.clone(),
        result_value: item.result_value.clone(),
        result_unit: item.result_unit.clone(),
        reference_text: item.reference_text.clone(),
    }
}

pub fn to_summary(report: &LabReport) -> LabReportSummaryOutput {
    LabReportSummaryOutput {
        id: report.id,
        patient_id: report.patient_id,
        report_date: report.report_date,
        summary_tests: report
            .test_results
            .iter()
            .map(|result| LabResultSummaryOutput {
                test_name: result.test_name.clone(),
                collected_at: result.collected_at,
                key_results: result
                    .items
                    .iter()
                    .map(|item| ResultItemSummaryOutput {
                        parameter_name: item.parameter_name.clone(),
                        result_value: item.result_value.clone(),
                        result_unit: item.result_unit.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabReport {
        let mut report = LabReport::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        report.lab_name = Some("Lab Central".into());
        report.raw_text = Some("texto completo".into());
        report.fingerprint = Some("f".repeat(64));
        let mut result = LabResult::new(report.id, "Hemoglobina").unwrap();
        result.method = Some("Automatizado".into());
        let mut item = LabResultItem::new(result.id, "Hb").unwrap();
        item.result_value = Some("13.5".into());
        item.result_unit = Some("g/dL".into());
        item.reference_text = Some("12 a 16".into());
        result.items.push(item);
        report.test_results.push(result);
        report
    }

    #[test]
    fn full_view_copies_every_field() {
        let report = sample();
        let out = to_output(&report);
        assert_eq!(out.id, report.id);
        assert_eq!(out.uploaded_by_user_id, report.uploaded_by);
        assert_eq!(out.lab_name.as_deref(), Some("Lab Central"));
        assert_eq!(out.fingerprint, report.fingerprint);
        assert_eq!(out.test_results[0].id, report.test_results[0].id);
        assert_eq!(out.test_results[0].method.as_deref(), Some("Automatizado"));
        let item = &out.test_results[0].items[0];
        assert_eq!(item.reference_text.as_deref(), Some("12 a 16"));
        assert_eq!(out.created_at, report.created_at);
    }

    #[test]
    fn full_view_does_not_carry_raw_text() {
        let json = serde_json::to_value(to_output(&sample())).unwrap();
        assert!(json.get("raw_text").is_none());
        assert_eq!(json["test_results"][0]["items"][0]["parameter_name"], "Hb");
    }

    #[test]
    fn summary_keeps_key_results_only() {
        let report = sample();
        let summary = to_summary(&report);
        assert_eq!(summary.id, report.id);
        assert_eq!(summary.summary_tests[0].test_name, "Hemoglobina");
        assert_eq!(
            summary.summary_tests[0].key_results,
            vec![ResultItemSummaryOutput {
                parameter_name: "Hb".into(),
                result_value: Some("13.5".into()),
                result_unit: Some("g/dL".into()),
            }]
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("report_date").is_none());
        assert!(json["summary_tests"][0].get("collected_at").is_none());
    }

    #[test]
    fn empty_report_projects_to_empty_lists() {
        let report = LabReport::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(to_output(&report).test_results.is_empty());
        assert!(to_summary(&report).summary_tests.is_empty());
    }
}
