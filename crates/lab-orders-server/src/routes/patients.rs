//! Patient endpoints (`/api/patients`).

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use lab_orders_core::{DbError, Patient, PatientInput};

use super::MessageResponse;
use crate::error::{ApiError, Entity};
use crate::state::AppState;

fn store_error(err: DbError) -> ApiError {
    ApiError::store(Entity::Patient, err)
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = state
        .with_store(|store| store.list_patients().map_err(store_error))
        .await?;
    Ok(Json(patients))
}

pub async fn detail(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Patient>, ApiError> {
    let Path(id) = id?;
    let patient = state
        .with_store(move |store| store.get_patient(id).map_err(store_error))
        .await?
        .ok_or(ApiError::NotFound(Entity::Patient))?;
    Ok(Json(patient))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let Json(input) = payload?;
    let patient = input.validate()?;

    let created = state
        .with_store(move |store| store.insert_patient(&patient).map_err(store_error))
        .await?;
    tracing::info!(patient_id = created.id, "patient created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    let patient = input.validate()?;

    let updated = state
        .with_store(move |store| store.update_patient(id, &patient).map_err(store_error))
        .await?
        .ok_or(ApiError::NotFound(Entity::Patient))?;
    Ok(Json(updated))
}

pub async fn remove(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id?;
    let deleted = state
        .with_store(move |store| store.delete_patient(id).map_err(store_error))
        .await?;

    if !deleted {
        return Err(ApiError::NotFound(Entity::Patient));
    }
    Ok(Json(MessageResponse {
        message: "Patient deleted successfully",
    }))
}
