//! Order endpoints.
//!
//! - `GET /api/orders?patientName=&status=` lists orders with their patients
//! - `GET /api/orders/:id`
//! - `POST /api/orders` creates an order (201)
//! - `PUT /api/orders/:id` replaces an order
//! - `POST /api/orders/preview` derives totals without saving
//!
//! Totals in request bodies are ignored; the server derives them.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use lab_orders_core::orders::normalize_test_ids;
use lab_orders_core::{Money, Order, OrderFilter, OrderPayload, OrderWithPatient};

use crate::error::ApiError;
use crate::state::AppState;

/// Derived totals for a selection that has not been saved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPreview {
    pub test_ids: Vec<i64>,
    pub total_cost: Money,
    pub estimated_date: NaiveDate,
}

pub async fn list(
    State(state): State<AppState>,
    filter: Result<Query<OrderFilter>, QueryRejection>,
) -> Result<Json<Vec<OrderWithPatient>>, ApiError> {
    let Query(filter) = filter?;
    let orders = state
        .with_store(move |store| Ok(store.orders().list_orders(&filter)?))
        .await?;
    Ok(Json(orders))
}

pub async fn detail(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Order>, ApiError> {
    let Path(id) = id?;
    let order = state
        .with_store(move |store| Ok(store.orders().get_order(id)?))
        .await?;
    Ok(Json(order))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(payload) = payload?;
    let draft = payload.into_draft();

    let order = state
        .with_store(move |store| Ok(store.orders().create_order(draft.clone())?))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let draft = payload.into_draft();

    let order = state
        .with_store(move |store| Ok(store.orders().update_order(id, draft.clone())?))
        .await?;
    Ok(Json(order))
}

pub async fn preview(
    State(state): State<AppState>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<Json<OrderPreview>, ApiError> {
    let Json(payload) = payload?;
    let draft = payload.into_draft();

    let derived = state
        .with_store(move |store| Ok(store.orders().preview(&draft)?))
        .await?;

    // A preview always carries both derived fields
    match (derived.total_cost, derived.estimated_ready_date) {
        (Some(total_cost), Some(estimated_date)) => Ok(Json(OrderPreview {
            test_ids: normalize_test_ids(&derived.test_ids),
            total_cost,
            estimated_date,
        })),
        _ => Err(ApiError::Internal("preview produced no totals".into())),
    }
}
