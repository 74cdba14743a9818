//! Lab test catalog models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::input::{loose_number, non_blank, InputError};
use super::money::Money;

/// Upper bound on turnaround: one year in hours.
pub const MAX_TURNAROUND_HOURS: u32 = 8760;

/// Upper bound on a single lab test price: 1,000,000.00.
pub const MAX_PRICE: Money = Money::from_cents(100_000_000);

const REQUIRED_LAB_TEST_FIELDS: &str = "code, name, price, turnaroundTime";

/// A billable lab test in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabTest {
    /// Database identity
    pub id: i64,
    /// Short unique code, always uppercase (e.g., "CBC")
    pub code: String,
    /// Display name
    pub name: String,
    /// Price per test
    pub price: Money,
    /// Hours until results are ready
    #[serde(rename = "turnaroundTime")]
    pub turnaround_hours: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Validated fields for inserting or updating a lab test.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLabTest {
    pub code: String,
    pub name: String,
    pub price: Money,
    pub turnaround_hours: u32,
}

impl NewLabTest {
    /// Create a lab test definition. The code is upper-cased.
    pub fn new(code: &str, name: &str, price: Money, turnaround_hours: u32) -> Self {
        Self {
            code: code.trim().to_uppercase(),
            name: name.into(),
            price,
            turnaround_hours,
        }
    }
}

/// Lab test request body as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestInput {
    pub code: Option<String>,
    pub name: Option<String>,
    pub price: Option<serde_json::Value>,
    #[serde(alias = "turnaroundHours")]
    pub turnaround_time: Option<serde_json::Value>,
}

impl LabTestInput {
    pub fn validate(&self) -> Result<NewLabTest, InputError> {
        let missing = || InputError::MissingFields(REQUIRED_LAB_TEST_FIELDS);

        let code = non_blank(&self.code).ok_or_else(missing)?;
        let name = non_blank(&self.name).ok_or_else(missing)?;
        let price = self
            .price
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(missing)?;
        let turnaround = self
            .turnaround_time
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(missing)?;

        let price = loose_number(price)
            .and_then(Money::from_decimal)
            .filter(|p| !p.is_negative())
            .ok_or_else(|| InputError::Invalid("Price must be a non-negative number".into()))?;
        if price > MAX_PRICE {
            return Err(InputError::Invalid(format!(
                "Price must be no more than {}",
                MAX_PRICE
            )));
        }

        let turnaround_hours = loose_number(turnaround)
            .filter(|h| h.fract() == 0.0 && *h >= 1.0 && *h <= MAX_TURNAROUND_HOURS as f64)
            .map(|h| h as u32)
            .ok_or_else(|| {
                InputError::Invalid(format!(
                    "Turnaround time must be a positive integer (hours) and no more than {}",
                    MAX_TURNAROUND_HOURS
                ))
            })?;

        Ok(NewLabTest::new(&code, &name, price, turnaround_hours))
    }
}
