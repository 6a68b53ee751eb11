pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod observability;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use infrastructure::{axum_http::http_serve, postgres::postgres_connection};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("subscription-service")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let database = dotenvy_env.database.clone();
    let postgres_pool =
        tokio::task::spawn_blocking(move || postgres_connection::establish_connection(&database))
            .await??;
    info!("Postgres connection has been established");

    http_serve::start(Arc::new(dotenvy_env), Arc::new(postgres_pool)).await?;

    Ok(())
}
