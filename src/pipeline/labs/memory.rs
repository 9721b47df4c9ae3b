//! In-memory patient and lab stores with the same contract as the SQLite
//! store, including the (patient_id, fingerprint) uniqueness rule.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};

use uuid::Uuid;

use super::types::{LabRepository, PatientLookup};
use crate::db::DatabaseError;
use crate::models::{parameter_key, LabReport, LabResultItemTimeline, Patient};

#[derive(Default)]
pub struct InMemoryLabStore {
    patients: RwLock<HashMap<Uuid, Patient>>,
    reports: Mutex<Vec<LabReport>>,
}

impl InMemoryLabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patient(&self, patient: Patient) -> Result<(), DatabaseError> {
        let mut patients = self
            .patients
            .write()
            .map_err(|_| DatabaseError::LockPoisoned)?;
        patients.insert(patient.id, patient);
        Ok(())
    }

    pub fn report_count(&self) -> Result<usize, DatabaseError> {
        Ok(self.reports()?.len())
    }

    fn reports(&self) -> Result<MutexGuard<'_, Vec<LabReport>>, DatabaseError> {
        self.reports.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl PatientLookup for InMemoryLabStore {
    fn find_patient(&self, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
        let patients = self
            .patients
            .read()
            .map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(patients.get(id).cloned())
    }
}

impl LabRepository for InMemoryLabStore {
    fn exists_by_fingerprint(
        &self,
        patient_id: &Uuid,
        fingerprint: &str,
    ) -> Result<bool, DatabaseError> {
        Ok(self.reports()?.iter().any(|r| {
            r.patient_id == *patient_id && r.fingerprint.as_deref() == Some(fingerprint)
        }))
    }

    fn create(&self, report: &LabReport) -> Result<(), DatabaseError> {
        let mut reports = self.reports()?;
        if let Some(fingerprint) = report.fingerprint.as_deref() {
            let taken = reports.iter().any(|r| {
                r.patient_id == report.patient_id && r.fingerprint.as_deref() == Some(fingerprint)
            });
            if taken {
                return Err(DatabaseError::UniqueViolation(format!(
                    "lab_reports.patient_id, lab_reports.fingerprint ({fingerprint})"
                )));
            }
        }
        if reports.iter().any(|r| r.id == report.id) {
            return Err(DatabaseError::UniqueViolation(format!(
                "lab_reports.id ({})",
                report.id
            )));
        }
        reports.push(report.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
        Ok(self.reports()?.iter().find(|r| r.id == *id).cloned())
    }

    fn list_by_patient(
        &self,
        patient_id: &Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabReport>, DatabaseError> {
        let mut matching: Vec<LabReport> = self
            .reports()?
            .iter()
            .filter(|r| r.patient_id == *patient_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    fn list_items_by_parameter(
        &self,
        patient_id: &Uuid,
        parameter_name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabResultItemTimeline>, DatabaseError> {
        let wanted = parameter_key(parameter_name);
        let reports = self.reports()?;

        let mut rows = Vec::new();
        for report in reports.iter().filter(|r| r.patient_id == *patient_id) {
            for result in &report.test_results {
                let when = result
                    .collected_at
                    .or(report.report_date)
                    .unwrap_or_else(|| report.created_at.fixed_offset());
                for item in &result.items {
                    if parameter_key(&item.parameter_name) != wanted {
                        continue;
                    }
                    rows.push((
                        when,
                        LabResultItemTimeline {
                            report_id: report.id,
                            lab_result_id: result.id,
                            item_id: item.id,
                            report_date: report.report_date,
                            collected_at: result.collected_at,
                            test_name: result.test_name.clone(),
                            parameter_name: item.parameter_name.clone(),
                            result_value: item.result_value.clone(),
                            result_unit: item.result_unit.clone(),
                        },
                    ));
                }
            }
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.item_id.cmp(&b.1.item_id)));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(_, row)| row)
            .collect())
    }
}
