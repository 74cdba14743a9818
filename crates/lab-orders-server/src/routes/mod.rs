//! HTTP API router.
//!
//! Every route is nested under `/api/`. Store work happens in
//! [`AppState::with_store`]; handlers only parse, call, and shape the reply.
//!
//! NOTE: Path params use `:param` syntax (axum 0.7).

pub mod orders;
pub mod patients;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Body returned by successful deletes.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
    })
}

/// Build the API router with request tracing and permissive CORS.
pub fn api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/preview", post(orders::preview))
        .route("/orders/:id", get(orders::detail).put(orders::update))
        .route("/lab-tests", get(lab_tests::list).post(lab_tests::create))
        .route(
            "/lab-tests/:id",
            get(lab_tests::detail)
                .put(lab_tests::update)
                .delete(lab_tests::remove),
        )
        .route("/patients", get(patients::list).post(patients::create))
        .route(
            "/patients/:id",
            get(patients::detail)
                .put(patients::update)
                .delete(patients::remove),
        )
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use lab_orders_core::Database;
    use tower::ServiceExt;

    use crate::state::RetryPolicy;

    fn app() -> Router {
        let db = Database::open_in_memory().unwrap();
        api_router(AppState::new(db, RetryPolicy::none()))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["message"], "Server is running");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = app()
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let response = app()
            .oneshot(
                Request::get("/api/health")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
