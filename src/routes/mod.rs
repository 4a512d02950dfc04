//! Router assembly. `build_app` is shared by the binary and the integration tests.

mod characters;
mod common;
mod entity;

pub use characters::character_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Full application router: common, character and entity routes, with request tracing and a
/// body size cap (oversized bodies get 413).
pub fn build_app(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(character_routes(state.clone()))
        .merge(entity_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
