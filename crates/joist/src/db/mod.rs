//! Database module: connection pool, item storage, and the change listener.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

mod items;
mod listener;

pub use items::{Item, ItemRepository, NewItem};
pub use listener::PgChangeSource;

/// Database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and run pending migrations.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .context("connecting to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create a pool without establishing a connection (for tests).
    ///
    /// No I/O happens until a query is issued, so this works without a
    /// reachable server. Migrations are not run.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(&config.url)
            .context("parsing database URL")?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the pool can still hand out connections.
    pub fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
