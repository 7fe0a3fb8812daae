//! HTTP JSON surface.

mod error;
mod routes;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::error_code;
#[cfg(test)]
use error::ApiError;

use crate::server::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/codes", get(routes::derive_codes))
        .route("/v1/item-numbers", post(routes::allocate))
        .route("/v1/counters", get(routes::list_counters))
        .route("/v1/counters/{prefix}", get(routes::get_counter))
        .route("/v1/counters/{prefix}/advance", post(routes::advance_counter))
        .route("/v1/items/{id}", get(routes::get_item).put(routes::save_item))
        .route(
            "/v1/items/{id}/item-number/reset",
            post(routes::reset_item_number),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
