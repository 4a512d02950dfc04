//! Read-only character endpoints: the joined detail listing, the overview view and the
//! by-affiliation routine. Database failures surface as 500 with the raw message.

use crate::error::AppError;
use crate::response::success_many;
use crate::service::CharacterQueries;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn detailed_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rows = CharacterQueries::details(&state.pool).await?;
    Ok(success_many(rows))
}

pub async fn character_overview(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rows = CharacterQueries::overview(&state.pool).await?;
    Ok(success_many(rows))
}

pub async fn characters_by_affiliation(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let rows = CharacterQueries::by_affiliation(&state.pool, &name).await?;
    Ok(success_many(rows))
}
