use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_utc_timestamp;
use crate::db::DatabaseError;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, birth_date, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            patient
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT full_name, birth_date, created_at FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((full_name, birth_date, created_at)) = row else {
        return Ok(None);
    };

    let birth_date = birth_date
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| DatabaseError::InvalidValue {
                field: "patients.birth_date".into(),
                value: s,
            })
        })
        .transpose()?;

    Ok(Some(Patient {
        id: *id,
        full_name,
        birth_date,
        created_at: parse_utc_timestamp("patients.created_at", &created_at)?,
    }))
}
