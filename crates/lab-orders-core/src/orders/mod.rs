//! Order composition engine.
//!
//! Pipeline: Selection → Normalization → Derivation → Validation → Atomic write
//!
//! Derived fields are always computed here from the catalog snapshot current
//! at write time; totals submitted by clients are ignored.

mod derivation;
mod filter;
mod validator;

pub use derivation::*;
pub use filter::*;
pub use validator::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{DbError, DbResult, StoreFailure};
use crate::models::{LabTest, Order, OrderDraft, OrderWithPatient};

/// Order operation errors.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Invalid patient ID or test ID provided")]
    ReferentialConflict,

    #[error("Store temporarily unavailable: {0}")]
    TransientStoreFailure(DbError),

    #[error("Store error: {0}")]
    Store(DbError),
}

impl From<DbError> for OrderError {
    fn from(e: DbError) -> Self {
        match e.classify() {
            StoreFailure::Transient => OrderError::TransientStoreFailure(e),
            StoreFailure::ForeignKey => OrderError::ReferentialConflict,
            StoreFailure::Unique | StoreFailure::Other => OrderError::Store(e),
        }
    }
}

impl OrderError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(e) => e.kind(),
            OrderError::NotFound(_) => "not_found",
            OrderError::ReferentialConflict => "referential_conflict",
            OrderError::TransientStoreFailure(_) => "transient_store_failure",
            OrderError::Store(_) => "internal",
        }
    }

    /// Only connectivity-class failures may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::TransientStoreFailure(_))
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

/// Storage the order engine needs. Each write is a single atomic statement.
pub trait OrderRepository {
    fn patient_exists(&self, patient_id: i64) -> DbResult<bool>;

    /// Lab tests among `ids` that exist. Missing ids are simply absent.
    fn find_lab_tests(&self, ids: &[i64]) -> DbResult<Vec<LabTest>>;

    fn insert_order(&self, order: &ValidatedOrder, created_at: DateTime<Utc>) -> DbResult<Order>;

    /// Returns `None` when no order has this id.
    fn update_order(&self, id: i64, order: &ValidatedOrder) -> DbResult<Option<Order>>;

    fn get_order(&self, id: i64) -> DbResult<Option<Order>>;

    /// Matching orders with their patients, newest first.
    fn list_orders(&self, query: &OrderQuery) -> DbResult<Vec<OrderWithPatient>>;
}

/// Coordinates derivation, validation and persistence.
pub struct OrderService<'a, R: OrderRepository + ?Sized> {
    repo: &'a R,
    clock: &'a dyn Clock,
}

impl<'a, R: OrderRepository + ?Sized> OrderService<'a, R> {
    /// Create a service using the system clock.
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            clock: &SystemClock,
        }
    }

    /// Create a service with an injected clock.
    pub fn with_clock(repo: &'a R, clock: &'a dyn Clock) -> Self {
        Self { repo, clock }
    }

    /// Fill in derived fields for a draft without validating or saving it.
    pub fn preview(&self, draft: &OrderDraft) -> OrderResult<OrderDraft> {
        let catalog = self.catalog_snapshot(draft)?;
        let mut preview = draft.clone();
        preview.refresh_totals(&catalog, self.clock)?;
        Ok(preview)
    }

    /// Derive, validate and insert a new order.
    pub fn create_order(&self, draft: OrderDraft) -> OrderResult<Order> {
        let validated = self.prepare(draft)?;
        let order = self.repo.insert_order(&validated, self.clock.now())?;

        tracing::info!(
            order_id = order.id,
            patient_id = order.patient_id,
            tests = order.test_ids.len(),
            total_cost = %order.total_cost,
            "order created"
        );
        Ok(order)
    }

    /// Derive, validate and overwrite an existing order.
    ///
    /// Totals are recomputed against the current catalog.
    pub fn update_order(&self, id: i64, draft: OrderDraft) -> OrderResult<Order> {
        if self.repo.get_order(id)?.is_none() {
            return Err(OrderError::NotFound(id));
        }

        let validated = self.prepare(draft)?;
        let order = self
            .repo
            .update_order(id, &validated)?
            .ok_or(OrderError::NotFound(id))?;

        tracing::info!(
            order_id = order.id,
            status = %order.status,
            total_cost = %order.total_cost,
            "order updated"
        );
        Ok(order)
    }

    pub fn get_order(&self, id: i64) -> OrderResult<Order> {
        self.repo.get_order(id)?.ok_or(OrderError::NotFound(id))
    }

    /// List orders matching the filter, newest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> OrderResult<Vec<OrderWithPatient>> {
        let query = build_order_query(filter);
        if query.is_unsatisfiable() {
            tracing::debug!(status = ?query.status(), "status filter matches no orders");
            return Ok(Vec::new());
        }
        Ok(self.repo.list_orders(&query)?)
    }

    fn catalog_snapshot(&self, draft: &OrderDraft) -> OrderResult<CatalogSnapshot> {
        let ids = normalize_test_ids(&draft.test_ids);
        if ids.is_empty() {
            return Ok(CatalogSnapshot::new());
        }
        Ok(snapshot_of(&self.repo.find_lab_tests(&ids)?))
    }

    fn prepare(&self, mut draft: OrderDraft) -> OrderResult<ValidatedOrder> {
        let catalog = self.catalog_snapshot(&draft)?;
        draft.refresh_totals(&catalog, self.clock)?;

        let result = validate_order_draft(
            &draft,
            |patient_id| Ok::<_, OrderError>(self.repo.patient_exists(patient_id)?),
            |ids| {
                Ok(ids
                    .iter()
                    .copied()
                    .filter(|id| catalog.contains_key(id))
                    .collect())
            },
        );

        if let Err(OrderError::Validation(e)) = &result {
            tracing::debug!(kind = e.kind(), error = %e, "order draft rejected");
        }
        result
    }
}
