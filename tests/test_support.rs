use std::sync::Arc;

use once_cell::sync::Lazy;
use seisflow_persistence::{build_pool, ConnectionProvider, DbConfig, PgPool, PoolProvider};

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env();
    build_pool(&cfg.url, 1, 1).ok()
});

pub fn connections() -> Option<Arc<dyn ConnectionProvider>> {
    TEST_POOL.clone().map(|pool| Arc::new(PoolProvider { pool }) as Arc<dyn ConnectionProvider>)
}
