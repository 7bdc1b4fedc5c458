//! Axum request handlers for all service endpoints.
//!
//! Record handlers are generic over [`Model`] and return records exactly as
//! the store holds them. Sensitive fields are therefore tokens at this point;
//! the response middleware decrypts them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::ServiceError;
use common::protocol::{ErrorResponse, HealthResponse};
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::AppState;
use crate::models::Model;

/// `POST /<collection>`: store a new record.
pub async fn create<M: Model>(
    State(state): State<AppState>,
    Json(input): Json<M::Input>,
) -> Response {
    match state.store.create::<M>(input).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// `GET /<collection>`: every record of the model.
pub async fn list<M: Model>(State(state): State<AppState>) -> Response {
    Json(state.store.list::<M>().await).into_response()
}

/// `GET /<collection>/:id`
pub async fn get<M: Model>(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get::<M>(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// `PATCH /<collection>/:id`: merge the sent fields into a record.
pub async fn update<M: Model>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<M::Patch>,
) -> Response {
    match state.store.update::<M>(id, patch).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// `GET /health`: liveness check.
///
/// The cipher is built before the server binds, so a running process is
/// always ready.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        iv_mode: state.iv_mode.as_str().into(),
        sensitive_fields: state.shield.registry().len(),
        records_stored: state.store.len().await,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> Response {
    error_response(ServiceError::NotFound(
        "the requested resource does not exist".into(),
    ))
}

/// Render a [`ServiceError`] as its status code and JSON body.
pub fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    } else {
        debug!(error = %err, "request rejected");
    }
    (status, Json(ErrorResponse::from(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;
    use crate::store::tests::pat;
    use axum::{body::Body, http::Request, routing::get as get_route, Router};
    use tower::ServiceExt;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get_route(health))
            .route("/clients/:id", get_route(get::<Client>))
            .with_state(state)
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_mode_and_counts() {
        let state = AppState::default();
        state.store.create::<Client>(pat()).await.unwrap();

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = test_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["iv_mode"], "fixed");
        assert_eq!(body["sensitive_fields"], 9);
        assert_eq!(body["records_stored"], 1);
    }

    #[tokio::test]
    async fn handlers_return_stored_tokens_without_middleware() {
        let state = AppState::default();
        let created = state.store.create::<Client>(pat()).await.unwrap();
        let id = created["id"].as_str().unwrap();

        let req = Request::builder()
            .uri(format!("/clients/{id}"))
            .body(Body::empty())
            .unwrap();
        let body = json_body(test_router(state).oneshot(req).await.unwrap()).await;
        assert_eq!(body["email"], created["email"]);
        assert_ne!(body["email"], "pat@example.com");
    }

    #[tokio::test]
    async fn missing_record_is_json_404() {
        let req = Request::builder()
            .uri(format!("/clients/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let resp = test_router(AppState::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["code"], "not_found");
    }

    #[test]
    fn error_response_uses_service_error_status() {
        let resp = error_response(ServiceError::BadRequest("nope".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = error_response(ServiceError::Internal("boom".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
