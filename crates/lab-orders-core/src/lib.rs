//! Lab-Orders Core Library
//!
//! Patients, a catalog of billable lab tests, and orders that bundle tests
//! for a patient with a computed cost and turnaround estimate.
//!
//! # Architecture
//!
//! ```text
//! Test selection ──► normalize (drop nulls, dedupe)
//!                          │
//!                          ▼
//!          catalog snapshot (prices, turnaround hours)
//!                          │
//!                          ▼
//!      derive totals ──► totalCost, estimatedReadyDate
//!                          │
//!                          ▼
//!      validate ──► patient exists, tests exist, fields present
//!                          │
//!                          ▼
//!              single atomic INSERT / UPDATE
//!                          │
//!                          ▼
//!      list views ◄── filter (name substring AND status), newest first
//! ```
//!
//! # Core Principle
//!
//! **Derived fields have one authority.** Total cost and ready date are
//! recomputed from the catalog on every create and update; client-submitted
//! values are never stored.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Patient, LabTest, Order, OrderDraft, Money)
//! - [`orders`]: Derivation, validation, filtering and the order service

pub mod db;
pub mod models;
pub mod orders;

// Re-export commonly used types
pub use db::{Database, DbError, DbResult, StoreFailure};
pub use models::{
    InputError, LabTest, LabTestInput, Money, NewLabTest, NewPatient, Order, OrderDraft,
    OrderPayload, OrderStatus, OrderWithPatient, Patient, PatientInput,
};
pub use orders::{
    build_order_query, derive_totals, validate_order_draft, Clock, FixedClock, OrderError,
    OrderFilter, OrderQuery, OrderRepository, OrderService, SystemClock, ValidationError,
};
