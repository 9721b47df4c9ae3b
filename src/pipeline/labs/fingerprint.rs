//! Content fingerprint of a lab report, used as the deduplication key.
//!
//! One line per measured item, `patient|date|TEST|PARAMETER|value`, sorted
//! so extraction order does not matter, hashed with SHA-256. Units and
//! reference text are not part of it.

use chrono::{DateTime, FixedOffset, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::LabReport;

/// Date placeholder for results with neither a collection nor a report date.
/// Stored fingerprints depend on this exact text.
pub const MISSING_DATE: &str = "000-00-00";

/// Compute the lowercase hex SHA-256 fingerprint of a normalized report.
pub fn generate_fingerprint(patient_id: &Uuid, report: &LabReport) -> String {
    let lines = fingerprint_lines(patient_id, report);

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Canonical lines the fingerprint is computed over, already sorted.
/// Duplicates are kept.
pub fn fingerprint_lines(patient_id: &Uuid, report: &LabReport) -> Vec<String> {
    let patient = patient_id.to_string();
    let mut lines = Vec::with_capacity(report.item_count());

    for result in &report.test_results {
        let date = format_date(result.collected_at.or(report.report_date));
        let test = result.test_name.trim().to_uppercase();

        for item in &result.items {
            lines.push(format!(
                "{}|{}|{}|{}|{}",
                patient,
                date,
                test,
                item.parameter_name.trim().to_uppercase(),
                item.result_value.as_deref().unwrap_or("").trim(),
            ));
        }
    }

    lines.sort();
    lines
}

fn format_date(value: Option<DateTime<FixedOffset>>) -> String {
    match value {
        Some(dt) => dt.with_timezone(&Utc).format("%Y-%m-%d").to_string(),
        None => MISSING_DATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{LabResult, LabResultItem};

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn patient() -> Uuid {
        Uuid::parse_str("11111111-2222-3333-4444-555555555555").unwrap()
    }

    fn day(d: u32) -> Option<DateTime<FixedOffset>> {
        Some(Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap().fixed_offset())
    }

    /// (test, collected day, [(parameter, value, unit)])
    fn build(results: Vec<(&str, Option<u32>, Vec<(&str, &str, &str)>)>) -> LabReport {
        let mut report = LabReport::new(patient(), Uuid::new_v4()).unwrap();
        report.report_date = day(1);
        for (test, collected, items) in results {
            let mut result = LabResult::new(report.id, test).unwrap();
            result.collected_at = collected.and_then(day);
            for (param, value, unit) in items {
                let mut item = LabResultItem::new(result.id, param).unwrap();
                item.result_value = Some(value.to_string());
                item.result_unit = Some(unit.to_string());
                result.items.push(item);
            }
            report.test_results.push(result);
        }
        report
    }

    fn baseline() -> LabReport {
        build(vec![
            ("Hemograma", Some(10), vec![("Hb", "13.5", "g/dL"), ("Ht", "40", "%")]),
            ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
        ])
    }

    #[test]
    fn fingerprint_is_64_lowercase_hex() {
        let fp = generate_fingerprint(&patient(), &baseline());
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn lines_follow_canonical_format() {
        let lines = fingerprint_lines(&patient(), &baseline());
        assert_eq!(
            lines,
            vec![
                "11111111-2222-3333-4444-555555555555|2024-03-01|GLICOSE|GLICOSE|92",
                "11111111-2222-3333-4444-555555555555|2024-03-10|HEMOGRAMA|HB|13.5",
                "11111111-2222-3333-4444-555555555555|2024-03-10|HEMOGRAMA|HT|40",
            ]
        );
    }

    #[test]
    fn order_of_results_and_items_does_not_matter() {
        let permuted = build(vec![
            ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
            ("Hemograma", Some(10), vec![("Ht", "40", "%"), ("Hb", "13.5", "g/dL")]),
        ]);
        assert_eq!(
            generate_fingerprint(&patient(), &baseline()),
            generate_fingerprint(&patient(), &permuted)
        );
    }

    #[test]
    fn measurement_changes_alter_fingerprint() {
        let base = generate_fingerprint(&patient(), &baseline());
        let variants = [
            build(vec![
                ("Hemograma", Some(10), vec![("Hb", "13.6", "g/dL"), ("Ht", "40", "%")]),
                ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
            ]),
            build(vec![
                ("Hemograma", Some(10), vec![("Hgb", "13.5", "g/dL"), ("Ht", "40", "%")]),
                ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
            ]),
            build(vec![
                ("Eritrograma", Some(10), vec![("Hb", "13.5", "g/dL"), ("Ht", "40", "%")]),
                ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
            ]),
            build(vec![
                ("Hemograma", Some(11), vec![("Hb", "13.5", "g/dL"), ("Ht", "40", "%")]),
                ("Glicose", None, vec![("Glicose", "92", "mg/dL")]),
            ]),
        ];
        for variant in &variants {
            assert_ne!(generate_fingerprint(&patient(), variant), base);
        }
        assert_ne!(generate_fingerprint(&Uuid::new_v4(), &baseline()), base);
    }

    #[test]
    fn unit_reference_and_case_do_not_alter_fingerprint() {
        let base = generate_fingerprint(&patient(), &baseline());
        let mut cosmetic = build(vec![
            (" hemograma ", Some(10), vec![("hb ", "13.5 ", "mmol/L"), ("HT", " 40", "")]),
            ("glicose", None, vec![("Glicose", "92", "mg%")]),
        ]);
        cosmetic.test_results[0].items[0].reference_text = Some("12 a 16".into());
        assert_eq!(generate_fingerprint(&patient(), &cosmetic), base);
    }

    #[test]
    fn missing_dates_use_placeholder() {
        let mut report = build(vec![("Urina", None, vec![("pH", "6.0", "")])]);
        report.report_date = None;
        let lines = fingerprint_lines(&patient(), &report);
        assert_eq!(lines[0], format!("{}|{}|URINA|PH|6.0", patient(), MISSING_DATE));
    }

    #[test]
    fn missing_value_hashes_as_empty() {
        let mut report = build(vec![("Urina", Some(2), vec![("Cor", "", "")])]);
        report.test_results[0].items[0].result_value = None;
        let lines = fingerprint_lines(&patient(), &report);
        assert!(lines[0].ends_with("|URINA|COR|"));
    }

    #[test]
    fn duplicate_lines_are_kept() {
        let once = build(vec![("Glicose", Some(2), vec![("Glicose", "92", "")])]);
        let twice = build(vec![("Glicose", Some(2), vec![("Glicose", "92", ""), ("Glicose", "92", "")])]);
        assert_ne!(
            generate_fingerprint(&patient(), &once),
            generate_fingerprint(&patient(), &twice)
        );
    }

    #[test]
    fn report_without_items_hashes_empty_input() {
        let report = build(vec![("Hemograma", Some(10), vec![])]);
        assert_eq!(generate_fingerprint(&patient(), &report), EMPTY_SHA256);
    }
}
