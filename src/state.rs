//! Shared application state for all routes.

use crate::config::ResolvedModel;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Resolved once at startup; never mutated afterwards.
    pub model: Arc<ResolvedModel>,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel) -> Self {
        Self {
            pool,
            model: Arc::new(model),
        }
    }
}
