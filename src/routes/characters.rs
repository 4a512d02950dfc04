//! Character query routes. Static segments take priority over the entity routes'
//! `/:path_segment/:id`.

use crate::handlers::characters::{character_overview, characters_by_affiliation, detailed_all};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn character_routes(state: AppState) -> Router {
    Router::new()
        .route("/characters/detailed/all", get(detailed_all))
        .route("/view/character_overview", get(character_overview))
        .route("/procedure/characters_by_affiliation/:name", get(characters_by_affiliation))
        .with_state(state)
}
