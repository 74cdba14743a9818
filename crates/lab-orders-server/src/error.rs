//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use lab_orders_core::{DbError, InputError, OrderError, StoreFailure, ValidationError};

/// Error response body: a human-readable message plus a stable kind.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

/// Catalog entities served over the API, for entity-specific messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Order,
    LabTest,
    Patient,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Entity::Order => "Order",
            Entity::LabTest => "Lab test",
            Entity::Patient => "Patient",
        }
    }

    fn duplicate_message(&self) -> String {
        match self {
            Entity::LabTest => "A lab test with this code already exists".into(),
            Entity::Patient => "A patient with this email already exists".into(),
            Entity::Order => "Order already exists".into(),
        }
    }

    fn in_use_message(&self) -> String {
        format!("{} is referenced by existing orders", self.label())
    }
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{} not found", .0.label())]
    NotFound(Entity),
    #[error("Invalid patient ID or test ID provided")]
    ReferentialConflict,
    #[error("{0}")]
    InUse(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Store temporarily unavailable: {0}")]
    Transient(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map a store error for a catalog or patient operation.
    pub fn store(entity: Entity, err: DbError) -> Self {
        match err.classify() {
            StoreFailure::Transient => ApiError::Transient(err.to_string()),
            StoreFailure::Unique => ApiError::Conflict(entity.duplicate_message()),
            StoreFailure::ForeignKey => {
                tracing::debug!(error = %err, "delete refused, entity in use");
                ApiError::InUse(entity.in_use_message())
            }
            StoreFailure::Other => ApiError::Internal(err.to_string()),
        }
    }

    /// True for failures worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(e) => e.kind(),
            ApiError::Input(InputError::MissingFields(_)) => "missing_required_field",
            ApiError::Input(InputError::Invalid(_)) | ApiError::BadRequest(_) => "invalid_field",
            ApiError::NotFound(_) => "not_found",
            ApiError::ReferentialConflict | ApiError::InUse(_) => "referential_conflict",
            ApiError::Conflict(_) => "conflict",
            ApiError::Transient(_) => "transient_store_failure",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Input(_)
            | ApiError::BadRequest(_)
            | ApiError::ReferentialConflict => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InUse(_) | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::Transient(detail) => {
                tracing::warn!(detail, "store unavailable after retries");
                "Store temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: message,
            kind: self.kind(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(e) => ApiError::Validation(e),
            OrderError::NotFound(_) => ApiError::NotFound(Entity::Order),
            OrderError::ReferentialConflict => ApiError::ReferentialConflict,
            OrderError::TransientStoreFailure(e) => ApiError::Transient(e.to_string()),
            OrderError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
