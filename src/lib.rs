pub(crate) mod controllers;
pub(crate) mod core;
pub(crate) mod routes;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::error::ConfigError as Error;
use crate::core::{config::Args, state::AppState};
use crate::token::backend::{Backend, RedisBackend};

pub async fn run() -> Result<(), Error> {
    let config = Args::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_default())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = match &config.store_url {
        Some(url) => Backend::Redis(RedisBackend::connect(url, config.store_timeout()).await?),
        None => {
            tracing::warn!("no store_url configured, credentials will not survive a restart");
            Backend::memory()
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url())
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let state = AppState::new(pool, backend, &config)?;

    tracing::info!("using {} credential store", state.backend_name);

    let app = routes::router::routes(state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::debug!("listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
