//! Order draft validation.

use chrono::NaiveDate;
use thiserror::Error;

use super::derivation::normalize_test_ids;
use crate::models::{Money, OrderDraft, OrderStatus};

/// Reasons a draft cannot be persisted. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A valid patient is required")]
    MissingPatient,

    #[error("At least one lab test must be selected")]
    NoTestsSelected,

    #[error("Unknown lab test ids: {0:?}")]
    UnknownTestId(Vec<i64>),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Invalid status: {0} (expected pending, processing, completed or cancelled)")]
    InvalidStatus(String),

    #[error("Total cost of the selected tests is out of range")]
    TotalOutOfRange,
}

impl ValidationError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingPatient => "missing_patient",
            ValidationError::NoTestsSelected => "no_tests_selected",
            ValidationError::UnknownTestId(_) => "unknown_test_id",
            ValidationError::MissingRequiredField(_) => "missing_required_field",
            ValidationError::InvalidStatus(_) => "invalid_status",
            ValidationError::TotalOutOfRange => "total_out_of_range",
        }
    }
}

/// A draft that passed validation, with normalized fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub patient_id: i64,
    /// Distinct, ascending
    pub test_ids: Vec<i64>,
    pub total_cost: Money,
    pub estimated_ready_date: NaiveDate,
    pub status: OrderStatus,
}

/// Validate a draft against the patient and catalog stores.
///
/// `patient_exists` answers whether a patient id is known; `resolve_tests`
/// returns the subset of the given ids that exist. Both may fail with the
/// caller's error type, which also absorbs [`ValidationError`]. The derived
/// fields must already be present on the draft; they are not recomputed.
pub fn validate_order_draft<E, P, R>(
    draft: &OrderDraft,
    patient_exists: P,
    resolve_tests: R,
) -> Result<ValidatedOrder, E>
where
    E: From<ValidationError>,
    P: FnOnce(i64) -> Result<bool, E>,
    R: FnOnce(&[i64]) -> Result<Vec<i64>, E>,
{
    let patient_id = draft.patient_id.ok_or(ValidationError::MissingPatient)?;
    if !patient_exists(patient_id)? {
        return Err(ValidationError::MissingPatient.into());
    }

    let test_ids = normalize_test_ids(&draft.test_ids);
    if test_ids.is_empty() {
        return Err(ValidationError::NoTestsSelected.into());
    }

    let resolved = resolve_tests(&test_ids)?;
    let unknown: Vec<i64> = test_ids
        .iter()
        .copied()
        .filter(|id| !resolved.contains(id))
        .collect();
    if !unknown.is_empty() {
        return Err(ValidationError::UnknownTestId(unknown).into());
    }

    let total_cost = draft
        .total_cost
        .ok_or(ValidationError::MissingRequiredField("totalCost"))?;
    let estimated_ready_date = draft
        .estimated_ready_date
        .ok_or(ValidationError::MissingRequiredField("estimatedDate"))?;

    let status = match draft.status.as_deref() {
        None => OrderStatus::default(),
        Some(s) => OrderStatus::parse(s).ok_or_else(|| ValidationError::InvalidStatus(s.into()))?,
    };

    Ok(ValidatedOrder {
        patient_id,
        test_ids,
        total_cost,
        estimated_ready_date,
        status,
    })
}
