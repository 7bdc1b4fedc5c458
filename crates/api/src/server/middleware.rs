//! Axum middleware layers applied to the router.
//!
//! Request tracing, timeout enforcement, and response compression come from
//! `tower-http`. [`decrypt_responses`] is the read-path interceptor: every JSON
//! response body outside the excluded paths has its sensitive fields
//! decrypted before it leaves the process.

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use common::error::ServiceError;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use super::{handlers::error_response, state::AppState};

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default for the largest response body the interceptor will buffer.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Decrypt sensitive fields in outgoing JSON bodies.
///
/// Excluded paths and non-JSON responses pass through untouched. A body that
/// claims to be JSON but does not parse is forwarded unchanged, as is a body
/// whose known size exceeds [`AppState::max_response_bytes`].
pub async fn decrypt_responses(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if state.excluded.is_excluded(&path) {
        trace!(path = %path, "path excluded from response decryption");
        return next.run(request).await;
    }

    let response = next.run(request).await;
    if !is_json(response.headers()) {
        return response;
    }

    let limit = state.max_response_bytes;
    let (mut parts, body) = response.into_parts();
    if body.size_hint().lower() > limit as u64 {
        warn!(
            path = %path,
            limit,
            "response larger than decryption limit; forwarding as-is"
        );
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(b) => b,
        Err(e) => {
            error!(path = %path, error = %e, "failed to buffer response body");
            return error_response(ServiceError::Internal("response body unavailable".into()));
        }
    };

    let mut payload: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path, error = %e, "JSON response did not parse; forwarding as-is");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let report = state.shield.reveal(&mut payload);
    debug!(
        path = %path,
        records = report.records,
        decrypted = report.decrypted,
        plaintext = report.plaintext,
        stuck = report.stuck,
        "response decrypted"
    );

    match serde_json::to_vec(&payload) {
        Ok(body) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(e) => {
            error!(path = %path, error = %e, "failed to re-serialise response");
            error_response(ServiceError::Internal("response serialisation failed".into()))
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use fieldcrypt::detect::looks_encrypted;
    use serde_json::json;
    use tower::ServiceExt;

    /// Router whose routes return a freshly encrypted email under various
    /// paths and content types.
    fn test_router(state: AppState) -> Router {
        let token = state.shield.cipher().try_encrypt("pat@example.com").unwrap();
        let json_token = token.clone();
        let auth_token = token.clone();
        Router::new()
            .route(
                "/clients/raw",
                get(move || async move { Json(json!({"email": json_token})) }),
            )
            .route(
                "/auth/session",
                get(move || async move { Json(json!({"email": auth_token})) }),
            )
            .route("/text", get(move || async move { token.into_response() }))
            .route(
                "/broken",
                get(|| async {
                    let mut resp = "{not json".into_response();
                    resp.headers_mut().insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                    resp
                }),
            )
            .layer(from_fn_with_state(state.clone(), decrypt_responses))
            .with_state(state)
    }

    async fn body_of(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn json_responses_are_decrypted() {
        let (status, body) = body_of(test_router(AppState::default()), "/clients/raw").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["email"], "pat@example.com");
    }

    #[tokio::test]
    async fn excluded_paths_are_not_intercepted() {
        let (_, body) = body_of(test_router(AppState::default()), "/auth/session").await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(looks_encrypted(body["email"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn non_json_responses_pass_through() {
        let (_, body) = body_of(test_router(AppState::default()), "/text").await;
        assert!(looks_encrypted(std::str::from_utf8(&body).unwrap()));
    }

    #[tokio::test]
    async fn unparseable_json_is_forwarded() {
        let (status, body) = body_of(test_router(AppState::default()), "/broken").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"{not json");
    }

    #[tokio::test]
    async fn oversized_responses_are_forwarded_not_failed() {
        let state = AppState::default().with_max_response_bytes(16);
        let (status, body) = body_of(test_router(state), "/clients/raw").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(looks_encrypted(body["email"].as_str().unwrap()));
    }

    #[test]
    fn json_detection_accepts_charset_suffix() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&headers));
    }
}
