//! Catalog-driven REST backend for the Star Wars franchise database.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod seed;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use config::{builtin_catalog, load_from_dir, resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use db::{create_pool, ensure_database_exists};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::build_app;
pub use seed::{seed, SeedOutcome};
pub use service::{CharacterQueries, CrudService};
pub use settings::Settings;
pub use state::AppState;
