//! Axum router construction.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};
use crate::models::{Client, Session};

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Response decryption is the innermost layer so compression sees the
/// decrypted body.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route(
            "/clients",
            post(handlers::create::<Client>).get(handlers::list::<Client>),
        )
        .route(
            "/clients/:id",
            get(handlers::get::<Client>).patch(handlers::update::<Client>),
        )
        .route(
            "/sessions",
            post(handlers::create::<Session>).get(handlers::list::<Session>),
        )
        .route(
            "/sessions/:id",
            get(handlers::get::<Session>).patch(handlers::update::<Session>),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::decrypt_responses))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
