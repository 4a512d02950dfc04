//! starwars-api: serve the catalog over HTTP, apply migrations, or load the sample data.

use clap::{Parser, Subcommand};
use starwars_api::{
    apply_migrations, build_app, builtin_catalog, create_pool, ensure_database_exists, load_from_dir, resolve, seed,
    AppState, FullConfig, SeedOutcome, Settings,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "starwars-api")]
#[command(version)]
#[command(about = "REST API over the Star Wars franchise database")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Commands {
    /// Migrate, optionally seed (SEED_ON_START), then serve HTTP
    #[default]
    Serve,
    /// Create the database if missing and apply the catalog schema
    Migrate,
    /// Migrate, then insert the sample data unless it is already there
    Seed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("starwars_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let catalog = load_catalog(&settings).await?;
    let model = resolve(&catalog)?;

    ensure_database_exists(&settings.database_url).await?;
    let pool = create_pool(&settings.database_url, settings.max_connections).await?;
    apply_migrations(&pool, &catalog).await?;

    let command = cli.command.unwrap_or_default();
    if matches!(command, Commands::Seed) || (matches!(command, Commands::Serve) && settings.seed_on_start) {
        match seed(&pool, &model).await? {
            SeedOutcome::Populated(counts) => {
                for (entity, n) in counts {
                    println!("{:<14} {}", entity, n);
                }
            }
            SeedOutcome::AlreadyPopulated => println!("database already populated; nothing to do"),
        }
    }
    if !matches!(command, Commands::Serve) {
        return Ok(());
    }

    let state = AppState::new(pool, model);
    let app = build_app(state, settings.body_limit_bytes);
    let listener = TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn load_catalog(settings: &Settings) -> Result<FullConfig, starwars_api::ConfigError> {
    match &settings.catalog_path {
        Some(dir) => {
            tracing::info!(path = %dir.display(), "loading catalog");
            load_from_dir(dir).await
        }
        None => builtin_catalog(),
    }
}
