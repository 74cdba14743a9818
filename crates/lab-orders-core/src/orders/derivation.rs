//! Derived order fields: total cost and estimated ready date.
//!
//! Pure functions over a test selection and a catalog snapshot. The clock
//! is injected so results are reproducible.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::validator::ValidationError;
use crate::models::{LabTest, Money, OrderDraft};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The catalog facts derivation needs for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestPricing {
    pub price: Money,
    pub turnaround_hours: u32,
}

impl From<&LabTest> for TestPricing {
    fn from(test: &LabTest) -> Self {
        Self {
            price: test.price,
            turnaround_hours: test.turnaround_hours,
        }
    }
}

/// Catalog snapshot keyed by lab test id.
pub type CatalogSnapshot = HashMap<i64, TestPricing>;

/// Build a snapshot from catalog records.
pub fn snapshot_of(tests: &[LabTest]) -> CatalogSnapshot {
    tests.iter().map(|t| (t.id, TestPricing::from(t))).collect()
}

/// Output of [`derive_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedTotals {
    pub total_cost: Money,
    pub estimated_ready_date: NaiveDate,
}

/// Drop `None` entries and duplicates. Output is ascending.
pub fn normalize_test_ids(selected: &[Option<i64>]) -> Vec<i64> {
    selected
        .iter()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compute total cost and ready date for a selection.
///
/// Ids missing from the catalog contribute nothing. With no resolvable ids
/// the cost is zero and the ready date is today. Fails with
/// [`ValidationError::TotalOutOfRange`] if the prices do not sum in cents.
pub fn derive_totals(
    selected: &[Option<i64>],
    catalog: &CatalogSnapshot,
    clock: &dyn Clock,
) -> Result<DerivedTotals, ValidationError> {
    let resolved: Vec<&TestPricing> = normalize_test_ids(selected)
        .iter()
        .filter_map(|id| catalog.get(id))
        .collect();

    let total_cost = Money::checked_sum(resolved.iter().map(|t| t.price))
        .ok_or(ValidationError::TotalOutOfRange)?;
    let max_turnaround = resolved
        .iter()
        .map(|t| t.turnaround_hours)
        .max()
        .unwrap_or(0);

    let ready_at = clock.now() + Duration::hours(i64::from(max_turnaround));

    Ok(DerivedTotals {
        total_cost,
        estimated_ready_date: ready_at.date_naive(),
    })
}

impl OrderDraft {
    /// Recompute the derived fields from the current selection.
    ///
    /// On error the draft keeps its previous derived fields.
    pub fn refresh_totals(
        &mut self,
        catalog: &CatalogSnapshot,
        clock: &dyn Clock,
    ) -> Result<(), ValidationError> {
        let totals = derive_totals(&self.test_ids, catalog, clock)?;
        self.total_cost = Some(totals.total_cost);
        self.estimated_ready_date = Some(totals.estimated_ready_date);
        Ok(())
    }

    /// Replace the selection and re-derive.
    pub fn apply_selection(
        &mut self,
        test_ids: Vec<Option<i64>>,
        catalog: &CatalogSnapshot,
        clock: &dyn Clock,
    ) -> Result<(), ValidationError> {
        self.test_ids = test_ids;
        self.refresh_totals(catalog, clock)
    }

    /// Select the test if absent, deselect it if present, then re-derive.
    pub fn toggle_test(
        &mut self,
        test_id: i64,
        catalog: &CatalogSnapshot,
        clock: &dyn Clock,
    ) -> Result<(), ValidationError> {
        let mut ids = normalize_test_ids(&self.test_ids);
        match ids.binary_search(&test_id) {
            Ok(pos) => {
                ids.remove(pos);
            }
            Err(pos) => ids.insert(pos, test_id),
        }
        self.apply_selection(ids.into_iter().map(Some).collect(), catalog, clock)
    }
}
