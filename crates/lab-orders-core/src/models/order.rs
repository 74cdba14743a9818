//! Order models: persisted orders, drafts, and the request payload.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::input::{RawId, RawTestIds};
use super::money::Money;
use super::patient::Patient;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Exact, case-sensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted lab order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Database identity
    pub id: i64,
    pub patient_id: i64,
    /// Distinct test ids, ascending
    pub test_ids: Vec<i64>,
    /// Sum of test prices at the time the order was last written
    pub total_cost: Money,
    /// Date results are expected
    #[serde(rename = "estimatedDate")]
    pub estimated_ready_date: NaiveDate,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// An order together with its patient, as returned by list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderWithPatient {
    #[serde(flatten)]
    pub order: Order,
    pub patient: Patient,
}

/// An in-progress order (the mutable form state before validation).
///
/// `test_ids` is the raw selection and may contain duplicates or `None`
/// entries. `total_cost` and `estimated_ready_date` are derived fields,
/// written by the derivation engine and never taken from the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDraft {
    pub patient_id: Option<i64>,
    pub test_ids: Vec<Option<i64>>,
    pub total_cost: Option<Money>,
    pub estimated_ready_date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl OrderDraft {
    /// Create a draft for a patient with a test selection.
    pub fn new(patient_id: i64, test_ids: &[i64]) -> Self {
        Self {
            patient_id: Some(patient_id),
            test_ids: test_ids.iter().copied().map(Some).collect(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }
}

/// Order request body (`POST /orders`, `PUT /orders/{id}`).
///
/// `totalCost` and `estimatedDate` are accepted for compatibility but the
/// server recomputes both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub patient_id: Option<RawId>,
    pub test_ids: Option<RawTestIds>,
    pub total_cost: Option<serde_json::Value>,
    pub estimated_date: Option<serde_json::Value>,
    pub status: Option<String>,
}

impl OrderPayload {
    /// Convert to a draft. Client-submitted derived fields are dropped.
    pub fn into_draft(self) -> OrderDraft {
        OrderDraft {
            patient_id: self.patient_id.as_ref().and_then(RawId::to_id),
            test_ids: self.test_ids.as_ref().map(RawTestIds::to_ids).unwrap_or_default(),
            total_cost: None,
            estimated_ready_date: None,
            status: self.status.filter(|s| !s.trim().is_empty()),
        }
    }
}
