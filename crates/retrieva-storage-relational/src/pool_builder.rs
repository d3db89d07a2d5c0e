//! Builds a `sqlx` connection pool from `RelationalStorageConfig`.

use retrieva_config::RelationalStorageConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub struct PoolConfigBuilder;

impl PoolConfigBuilder {
    /// Translate the config's `pool_size`/`max_overflow` pair into sqlx's
    /// min/max connection counts: `pool_size` connections are kept warm,
    /// `max_overflow` more may be opened under load.
    #[must_use]
    pub fn options(config: &RelationalStorageConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(config.pool_size)
            .max_connections(config.pool_size + config.max_overflow)
    }

    #[must_use]
    pub fn connect_options(config: &RelationalStorageConfig, password: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(password)
    }
}
