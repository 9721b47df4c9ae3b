//! Canonical form for a lab report tree before fingerprinting and storage:
//! optional text trimmed with blanks removed, every timestamp in UTC.

use chrono::{DateTime, FixedOffset, Utc};

use crate::models::{LabReport, LabResult, LabResultItem};

fn trim_to_none(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
}

fn to_utc(value: &mut Option<DateTime<FixedOffset>>) {
    if let Some(dt) = value {
        *dt = dt.with_timezone(&Utc).fixed_offset();
    }
}

impl LabReport {
    /// Normalize the report and every result and item below it. Idempotent.
    pub fn normalize(&mut self) {
        trim_to_none(&mut self.patient_name);
        trim_to_none(&mut self.lab_name);
        trim_to_none(&mut self.lab_phone);
        trim_to_none(&mut self.insurance_provider);
        trim_to_none(&mut self.requesting_doctor);
        trim_to_none(&mut self.technical_manager);
        trim_to_none(&mut self.raw_text);
        trim_to_none(&mut self.fingerprint);

        to_utc(&mut self.patient_dob);
        to_utc(&mut self.report_date);

        for result in &mut self.test_results {
            result.normalize();
        }
    }
}

impl LabResult {
    pub fn normalize(&mut self) {
        self.test_name = self.test_name.trim().to_string();
        trim_to_none(&mut self.material);
        trim_to_none(&mut self.method);

        to_utc(&mut self.collected_at);
        to_utc(&mut self.release_at);

        for item in &mut self.items {
            item.normalize();
        }
    }
}

impl LabResultItem {
    pub fn normalize(&mut self) {
        self.parameter_name = self.parameter_name.trim().to_string();
        trim_to_none(&mut self.result_value);
        trim_to_none(&mut self.result_unit);
        trim_to_none(&mut self.reference_text);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn messy_report() -> LabReport {
        let mut report = LabReport::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        report.patient_name = Some("  Maria  ".into());
        report.lab_name = Some("   ".into());
        report.lab_phone = Some(String::new());
        report.raw_text = Some("\nLAUDO\n".into());
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        report.report_date = Some(brt.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap());

        let mut result = LabResult::new(report.id, "Hemograma").unwrap();
        result.material = Some(" Sangue ".into());
        result.method = Some("".into());
        result.collected_at = Some(brt.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap());

        let mut item = LabResultItem::new(result.id, "Hb").unwrap();
        item.result_value = Some(" 13.5 ".into());
        item.result_unit = Some(" ".into());
        item.reference_text = Some("12 a 16 ".into());
        result.items.push(item);
        report.test_results.push(result);
        report
    }

    #[test]
    fn trims_and_drops_blank_strings() {
        let mut report = messy_report();
        report.normalize();
        assert_eq!(report.patient_name.as_deref(), Some("Maria"));
        assert!(report.lab_name.is_none());
        assert!(report.lab_phone.is_none());
        assert_eq!(report.raw_text.as_deref(), Some("LAUDO"));

        let result = &report.test_results[0];
        assert_eq!(result.material.as_deref(), Some("Sangue"));
        assert!(result.method.is_none());

        let item = &result.items[0];
        assert_eq!(item.result_value.as_deref(), Some("13.5"));
        assert!(item.result_unit.is_none());
        assert_eq!(item.reference_text.as_deref(), Some("12 a 16"));
    }

    #[test]
    fn timestamps_move_to_utc_without_changing_instant() {
        let mut report = messy_report();
        let before = report.report_date.unwrap();
        report.normalize();
        let after = report.report_date.unwrap();
        assert_eq!(after, before);
        assert_eq!(after.offset().local_minus_utc(), 0);
        assert_eq!(after.date_naive().to_string(), "2024-03-11");

        let collected = report.test_results[0].collected_at.unwrap();
        assert_eq!(collected.offset().local_minus_utc(), 0);
        assert_eq!(collected.to_rfc3339(), "2024-03-10T11:00:00+00:00");
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut once = messy_report();
        once.normalize();
        let mut twice = once.clone();
        twice.normalize();
        assert_eq!(once, twice);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let mut report = LabReport::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        let updated = report.updated_at;
        report.normalize();
        assert!(report.patient_name.is_none());
        assert!(report.report_date.is_none());
        assert_eq!(report.updated_at, updated);
    }
}
