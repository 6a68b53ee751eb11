use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};

use super::config_model::{Database, DotEnvyConfig, Server};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: match env_parse("SERVER_PORT")? {
            Some(port) => port,
            None => env_parse("PORT")?.unwrap_or(8080),
        },
        body_limit: env_parse("SERVER_BODY_LIMIT")?.unwrap_or(1),
        timeout: env_parse("SERVER_TIMEOUT")?.unwrap_or(30),
    };

    let database = Database {
        url: database_url(),
        max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?.unwrap_or(20),
        min_idle: env_parse("DATABASE_MIN_IDLE")?.unwrap_or(10),
        connect_retries: env_parse("DATABASE_CONNECT_RETRIES")?.unwrap_or(15),
        connect_retry_interval: Duration::from_secs(
            env_parse("DATABASE_CONNECT_RETRY_INTERVAL")?.unwrap_or(2),
        ),
    };

    if database.max_connections == 0 {
        bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
    }
    if database.min_idle > database.max_connections {
        bail!(
            "DATABASE_MIN_IDLE ({}) must not exceed DATABASE_MAX_CONNECTIONS ({})",
            database.min_idle,
            database.max_connections
        );
    }

    Ok(DotEnvyConfig { server, database })
}

/// `DATABASE_URL` when set, otherwise assembled from the individual `DB_*` variables.
fn database_url() -> String {
    if let Some(url) = env_string("DATABASE_URL") {
        return url;
    }

    let host = env_string("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = env_string("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let user = env_string("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let password = env_string("DB_PASSWORD").unwrap_or_else(|| "postgres".to_string());
    let name = env_string("DB_NAME").unwrap_or_else(|| "subscription_db".to_string());

    format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode=disable")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} is invalid"))
        })
        .transpose()
}
