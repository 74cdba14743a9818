//! Patient models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::input::{non_blank, InputError};

const REQUIRED_PATIENT_FIELDS: &str = "firstName, lastName, dateOfBirth, email";

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Database identity
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    /// Unique per patient
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Validated fields for inserting or updating a patient.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewPatient {
    /// Create a patient with required fields only.
    pub fn new(first_name: &str, last_name: &str, date_of_birth: NaiveDate, email: &str) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth,
            email: email.into(),
            phone: None,
            address: None,
        }
    }
}

/// Patient request body as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl PatientInput {
    pub fn validate(&self) -> Result<NewPatient, InputError> {
        let (Some(first_name), Some(last_name), Some(dob), Some(email)) = (
            non_blank(&self.first_name),
            non_blank(&self.last_name),
            non_blank(&self.date_of_birth),
            non_blank(&self.email),
        ) else {
            return Err(InputError::MissingFields(REQUIRED_PATIENT_FIELDS));
        };

        let date_of_birth = parse_date(&dob)
            .ok_or_else(|| InputError::Invalid(format!("Invalid date of birth: {}", dob)))?;

        Ok(NewPatient {
            first_name,
            last_name,
            date_of_birth,
            email,
            phone: non_blank(&self.phone),
            address: non_blank(&self.address),
        })
    }
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp (date part kept).
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}
