//! HTTP API for lab order management.
//!
//! Serves patients, the lab test catalog and orders over JSON under `/api`,
//! backed by the SQLite store from `lab_orders_core`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{default_log_filter, ServerConfig};
pub use error::{ApiError, Entity};
pub use routes::api_router;
pub use state::{AppState, RetryPolicy};
