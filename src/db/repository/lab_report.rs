use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::{format_timestamp, parse_optional_timestamp, parse_utc_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const REPORT_COLUMNS: &str = "id, patient_id, uploaded_by, patient_name, patient_dob, lab_name,
     lab_phone, insurance_provider, requesting_doctor, technical_manager, report_date,
     raw_text, fingerprint, created_at, updated_at";

/// Insert a report with all its results and items in one transaction.
///
/// A second report with the same (patient_id, fingerprint) fails with
/// `DatabaseError::UniqueViolation` and leaves nothing behind. The write
/// lock is taken up front so concurrent writers queue on the busy timeout.
pub fn insert_lab_report(conn: &Connection, report: &LabReport) -> Result<(), DatabaseError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT INTO lab_reports (id, patient_id, uploaded_by, patient_name, patient_dob,
         lab_name, lab_phone, insurance_provider, requesting_doctor, technical_manager,
         report_date, raw_text, fingerprint, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            report.id.to_string(),
            report.patient_id.to_string(),
            report.uploaded_by.to_string(),
            report.patient_name,
            report.patient_dob.as_ref().map(format_timestamp),
            report.lab_name,
            report.lab_phone,
            report.insurance_provider,
            report.requesting_doctor,
            report.technical_manager,
            report.report_date.as_ref().map(format_timestamp),
            report.raw_text,
            report.fingerprint,
            format_timestamp(&report.created_at.fixed_offset()),
            format_timestamp(&report.updated_at.fixed_offset()),
        ],
    )?;

    for (position, result) in report.test_results.iter().enumerate() {
        tx.execute(
            "INSERT INTO lab_results (id, lab_report_id, position, test_name, material,
             method, collected_at, release_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.id.to_string(),
                report.id.to_string(),
                position as i64,
                result.test_name,
                result.material,
                result.method,
                result.collected_at.as_ref().map(format_timestamp),
                result.release_at.as_ref().map(format_timestamp),
            ],
        )?;

        for (item_position, item) in result.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO lab_result_items (id, lab_result_id, position, parameter_name,
                 parameter_key, result_value, result_unit, reference_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.id.to_string(),
                    result.id.to_string(),
                    item_position as i64,
                    item.parameter_name,
                    parameter_key(&item.parameter_name),
                    item.result_value,
                    item.result_unit,
                    item.reference_text,
                ],
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

pub fn lab_report_exists_by_fingerprint(
    conn: &Connection,
    patient_id: &Uuid,
    fingerprint: &str,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM lab_reports WHERE patient_id = ?1 AND fingerprint = ?2)",
        params![patient_id.to_string(), fingerprint],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Full report tree by id.
pub fn get_lab_report(conn: &Connection, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
    let sql = format!("SELECT {REPORT_COLUMNS} FROM lab_reports WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], report_row_from_rusqlite)
        .optional()?;

    match row {
        Some(row) => {
            let mut report = report_from_row(row)?;
            report.test_results = get_lab_results_for_report(conn, &report.id)?;
            Ok(Some(report))
        }
        None => Ok(None),
    }
}

/// Full report trees for one patient, newest first.
pub fn list_lab_reports_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
    limit: u32,
    offset: u32,
) -> Result<Vec<LabReport>, DatabaseError> {
    let sql = format!(
        "SELECT {REPORT_COLUMNS} FROM lab_reports
         WHERE patient_id = ?1
         ORDER BY created_at DESC, id
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), limit, offset],
        report_row_from_rusqlite,
    )?;

    let mut reports = Vec::new();
    for row in rows {
        let mut report = report_from_row(row?)?;
        report.test_results = get_lab_results_for_report(conn, &report.id)?;
        reports.push(report);
    }
    Ok(reports)
}

pub fn count_lab_reports_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM lab_reports WHERE patient_id = ?1",
        params![patient_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

/// History of one parameter across a patient's reports, newest measurement first.
/// The parameter name is matched on its folded key, so case differences in
/// accented names still match.
pub fn list_items_by_patient_and_parameter(
    conn: &Connection,
    patient_id: &Uuid,
    parameter_name: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<LabResultItemTimeline>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, res.id, i.id, r.report_date, res.collected_at, res.test_name,
                i.parameter_name, i.result_value, i.result_unit
         FROM lab_result_items i
         JOIN lab_results res ON res.id = i.lab_result_id
         JOIN lab_reports r ON r.id = res.lab_report_id
         WHERE r.patient_id = ?1 AND i.parameter_key = ?2
         ORDER BY COALESCE(res.collected_at, r.report_date, r.created_at) DESC, i.id
         LIMIT ?3 OFFSET ?4",
    )?;

    let rows = stmt.query_map(
        params![patient_id.to_string(), parameter_key(parameter_name), limit, offset],
        |row| {
            Ok(TimelineRow {
                report_id: row.get(0)?,
                lab_result_id: row.get(1)?,
                item_id: row.get(2)?,
                report_date: row.get(3)?,
                collected_at: row.get(4)?,
                test_name: row.get(5)?,
                parameter_name: row.get(6)?,
                result_value: row.get(7)?,
                result_unit: row.get(8)?,
            })
        },
    )?;

    let mut items = Vec::new();
    for row in rows {
        let row = row?;
        items.push(LabResultItemTimeline {
            report_id: parse_uuid("lab_reports.id", &row.report_id)?,
            lab_result_id: parse_uuid("lab_results.id", &row.lab_result_id)?,
            item_id: parse_uuid("lab_result_items.id", &row.item_id)?,
            report_date: parse_optional_timestamp("lab_reports.report_date", row.report_date)?,
            collected_at: parse_optional_timestamp("lab_results.collected_at", row.collected_at)?,
            test_name: row.test_name,
            parameter_name: row.parameter_name,
            result_value: row.result_value,
            result_unit: row.result_unit,
        });
    }
    Ok(items)
}

fn get_lab_results_for_report(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<LabResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, lab_report_id, test_name, material, method, collected_at, release_at
         FROM lab_results WHERE lab_report_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        Ok(ResultRow {
            id: row.get(0)?,
            lab_report_id: row.get(1)?,
            test_name: row.get(2)?,
            material: row.get(3)?,
            method: row.get(4)?,
            collected_at: row.get(5)?,
            release_at: row.get(6)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        let row = row?;
        let id = parse_uuid("lab_results.id", &row.id)?;
        results.push(LabResult {
            id,
            lab_report_id: parse_uuid("lab_results.lab_report_id", &row.lab_report_id)?,
            test_name: row.test_name,
            material: row.material,
            method: row.method,
            collected_at: parse_optional_timestamp("lab_results.collected_at", row.collected_at)?,
            release_at: parse_optional_timestamp("lab_results.release_at", row.release_at)?,
            items: get_lab_result_items(conn, &id)?,
        });
    }
    Ok(results)
}

fn get_lab_result_items(
    conn: &Connection,
    result_id: &Uuid,
) -> Result<Vec<LabResultItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, lab_result_id, parameter_name, result_value, result_unit, reference_text
         FROM lab_result_items WHERE lab_result_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![result_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, lab_result_id, parameter_name, result_value, result_unit, reference_text) = row?;
        items.push(LabResultItem {
            id: parse_uuid("lab_result_items.id", &id)?,
            lab_result_id: parse_uuid("lab_result_items.lab_result_id", &lab_result_id)?,
            parameter_name,
            result_value,
            result_unit,
            reference_text,
        });
    }
    Ok(items)
}

// Internal row types for mapping
struct ReportRow {
    id: String,
    patient_id: String,
    uploaded_by: String,
    patient_name: Option<String>,
    patient_dob: Option<String>,
    lab_name: Option<String>,
    lab_phone: Option<String>,
    insurance_provider: Option<String>,
    requesting_doctor: Option<String>,
    technical_manager: Option<String>,
    report_date: Option<String>,
    raw_text: Option<String>,
    fingerprint: Option<String>,
    created_at: String,
    updated_at: String,
}

struct ResultRow {
    id: String,
    lab_report_id: String,
    test_name: String,
    material: Option<String>,
    method: Option<String>,
    collected_at: Option<String>,
    release_at: Option<String>,
}

struct TimelineRow {
    report_id: String,
    lab_result_id: String,
    item_id: String,
    report_date: Option<String>,
    collected_at: Option<String>,
    test_name: String,
    parameter_name: String,
    result_value: Option<String>,
    result_unit: Option<String>,
}

fn report_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ReportRow, rusqlite::Error> {
    Ok(ReportRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        patient_name: row.get(3)?,
        patient_dob: row.get(4)?,
        lab_name: row.get(5)?,
        lab_phone: row.get(6)?,
        insurance_provider: row.get(7)?,
        requesting_doctor: row.get(8)?,
        technical_manager: row.get(9)?,
        report_date: row.get(10)?,
        raw_text: row.get(11)?,
        fingerprint: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<LabReport, DatabaseError> {
    Ok(LabReport {
        id: parse_uuid("lab_reports.id", &row.id)?,
        patient_id: parse_uuid("lab_reports.patient_id", &row.patient_id)?,
        uploaded_by: parse_uuid("lab_reports.uploaded_by", &row.uploaded_by)?,
        patient_name: row.patient_name,
        patient_dob: parse_optional_timestamp("lab_reports.patient_dob", row.patient_dob)?,
        lab_name: row.lab_name,
        lab_phone: row.lab_phone,
        insurance_provider: row.insurance_provider,
        requesting_doctor: row.requesting_doctor,
        technical_manager: row.technical_manager,
        report_date: parse_optional_timestamp("lab_reports.report_date", row.report_date)?,
        raw_text: row.raw_text,
        fingerprint: row.fingerprint,
        test_results: Vec::new(),
        created_at: parse_utc_timestamp("lab_reports.created_at", &row.created_at)?,
        updated_at: parse_utc_timestamp("lab_reports.updated_at", &row.updated_at)?,
    })
}
