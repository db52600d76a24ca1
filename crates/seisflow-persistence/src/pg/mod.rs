//! Postgres connection pooling (Diesel + r2d2).

use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Abstracts obtaining a connection so callers can inject a real pool
/// (production, integration tests) without coupling the rest of the crate
/// to r2d2 directly.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PooledConnection, PersistenceError>;
}

/// A `ConnectionProvider` backed by a `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PooledConnection, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Builds an r2d2 pool and immediately runs pending migrations against the
/// first checked-out connection.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        log::warn!("min_size > max_size ({validated_min} > {validated_max}), clamping min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .min_idle(Some(final_min))
        .max_size(validated_max)
        .build(manager)
        .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;

    let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
    run_pending_migrations(&mut conn)?;
    Ok(pool)
}

/// Development helper: loads `.env`, reads `DATABASE_URL`/pool sizes, and
/// builds an already-migrated pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
