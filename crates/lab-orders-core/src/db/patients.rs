//! Patient database operations.

use rusqlite::{params, OptionalExtension};

use super::{format_timestamp, parse_date, parse_timestamp, Database, DbError, DbResult};
use crate::models::{NewPatient, Patient};

const PATIENT_COLUMNS: &str =
    "id, first_name, last_name, date_of_birth, email, phone, address, created_at";

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &NewPatient) -> DbResult<Patient> {
        let ts = format_timestamp(&chrono::Utc::now());
        let created_at = parse_timestamp(&ts)?;

        self.conn.execute(
            r#"
            INSERT INTO patients (
                first_name, last_name, date_of_birth, email,
                phone, address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                patient.first_name,
                patient.last_name,
                patient.date_of_birth.format("%Y-%m-%d").to_string(),
                patient.email,
                patient.phone,
                patient.address,
                ts,
            ],
        )?;

        Ok(Patient {
            id: self.conn.last_insert_rowid(),
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            date_of_birth: patient.date_of_birth,
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            address: patient.address.clone(),
            created_at,
        })
    }

    /// Update an existing patient. Returns `None` if no patient has this id.
    pub fn update_patient(&self, id: i64, patient: &NewPatient) -> DbResult<Option<Patient>> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                first_name = ?2,
                last_name = ?3,
                date_of_birth = ?4,
                email = ?5,
                phone = ?6,
                address = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                patient.first_name,
                patient.last_name,
                patient.date_of_birth.format("%Y-%m-%d").to_string(),
                patient.email,
                patient.phone,
                patient.address,
                format_timestamp(&chrono::Utc::now()),
            ],
        )?;

        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_patient(id)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }

    /// List all patients, newest first.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY created_at DESC, id DESC",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Delete a patient. Fails with a foreign key violation while orders
    /// reference the patient.
    pub fn delete_patient(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
pub(crate) struct PatientRow {
    id: i64,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    created_at: String,
}

impl PatientRow {
    /// Read the `PATIENT_COLUMNS` layout starting at `offset`.
    pub(crate) fn from_row_at(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            first_name: row.get(offset + 1)?,
            last_name: row.get(offset + 2)?,
            date_of_birth: row.get(offset + 3)?,
            email: row.get(offset + 4)?,
            phone: row.get(offset + 5)?,
            address: row.get(offset + 6)?,
            created_at: row.get(offset + 7)?,
        })
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: parse_date(&row.date_of_birth)?,
            email: row.email,
            phone: row.phone,
            address: row.address,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
