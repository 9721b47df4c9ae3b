use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use uuid::Uuid;

use super::{
    get_lab_report, get_patient, insert_lab_report, insert_patient,
    lab_report_exists_by_fingerprint, list_items_by_patient_and_parameter,
    list_lab_reports_by_patient,
};
use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::DatabaseError;
use crate::models::{LabReport, LabResultItemTimeline, Patient};
use crate::pipeline::labs::{LabRepository, PatientLookup};

/// SQLite-backed lab store. One connection per store; open one store per
/// writer thread when writers must run in parallel.
pub struct SqliteLabStore {
    conn: Mutex<Connection>,
}

impl SqliteLabStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    pub fn add_patient(&self, patient: &Patient) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        insert_patient(&conn, patient)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl PatientLookup for SqliteLabStore {
    fn find_patient(&self, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
        let conn = self.lock()?;
        get_patient(&conn, id)
    }
}

impl LabRepository for SqliteLabStore {
    fn exists_by_fingerprint(
        &self,
        patient_id: &Uuid,
        fingerprint: &str,
    ) -> Result<bool, DatabaseError> {
        let conn = self.lock()?;
        lab_report_exists_by_fingerprint(&conn, patient_id, fingerprint)
    }

    fn create(&self, report: &LabReport) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        insert_lab_report(&conn, report)
    }

    fn find_by_id(&self, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
        let conn = self.lock()?;
        get_lab_report(&conn, id)
    }

    fn list_by_patient(
        &self,
        patient_id: &Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabReport>, DatabaseError> {
        let conn = self.lock()?;
        list_lab_reports_by_patient(&conn, patient_id, limit, offset)
    }

    fn list_items_by_parameter(
        &self,
        patient_id: &Uuid,
        parameter_name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LabResultItemTimeline>, DatabaseError> {
        let conn = self.lock()?;
        list_items_by_patient_and_parameter(&conn, patient_id, parameter_name, limit, offset)
    }
}
