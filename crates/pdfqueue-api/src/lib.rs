//! pdfqueue-api
//!
//! HTTP control surface for the PDF background queue: inspect, run and
//! delete queued tasks. Every queue route needs a bearer token carrying the
//! `edit_settings` capability.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    middleware,
    routing::{get, post},
};
use pdfqueue_core::app::ControlApi;

use crate::auth::{AuthState, EDIT_SETTINGS, TokenTable};

pub fn build_app(control: Arc<ControlApi>, tokens: TokenTable) -> Router {
    let queue = Router::new()
        .route("/background-process", get(routes::list))
        .route("/background-process/", get(routes::list))
        .route("/background-process/run/all", get(routes::run_all))
        .route("/background-process/run/task", post(routes::run_task))
        .route("/background-process/delete", post(routes::delete_all))
        .route("/background-process/delete/task", post(routes::delete_task))
        .route_layer(middleware::from_fn_with_state(
            AuthState::new(tokens, EDIT_SETTINGS),
            auth::require_capability,
        ))
        .layer(Extension(control));

    Router::new().route("/health", get(routes::health)).merge(queue)
}
