use std::time::Duration;

use anyhow::{Context, Result, bail};
use diesel::{
    Connection, PgConnection, RunQueryDsl,
    connection::CacheSize,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
    sql_query,
};
use tracing::{info, warn};

use crate::config::config_model::Database;

const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct DisablePreparedStatements;

impl CustomizeConnection<PgConnection, R2d2Error> for DisablePreparedStatements {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        Ok(())
    }
}

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

pub fn establish_connection(database: &Database) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(&database.url);
    let pool = Pool::builder()
        .max_size(database.max_connections)
        .min_idle(Some(database.min_idle))
        .max_lifetime(Some(CONNECTION_MAX_LIFETIME))
        .connection_timeout(CHECKOUT_TIMEOUT)
        .connection_customizer(Box::new(DisablePreparedStatements))
        .build_unchecked(manager);

    wait_until_ready(&pool, database.connect_retries, database.connect_retry_interval)?;
    Ok(pool)
}

/// Pings the database until it answers or `retries` attempts have failed.
fn wait_until_ready(pool: &PgPoolSquad, retries: u32, interval: Duration) -> Result<()> {
    let mut attempt: u32 = 0;
    loop {
        match ping(pool) {
            Ok(()) => {
                info!(failed_attempts = attempt, "postgres: connection is ready");
                return Ok(());
            }
            Err(err) => {
                attempt += 1;
                warn!(attempt, error = %err, "postgres: waiting for database");
                if attempt > retries {
                    bail!("database not available after {attempt} attempts: {err:#}");
                }
                std::thread::sleep(interval);
            }
        }
    }
}

fn ping(pool: &PgPoolSquad) -> Result<()> {
    let mut conn = pool.get().context("failed to check out a connection")?;
    sql_query("SELECT 1")
        .execute(&mut conn)
        .context("ping query failed")?;
    Ok(())
}
