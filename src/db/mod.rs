//! Database connection management

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;

/// Idempotent schema for the user store.
const USERS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id       BIGSERIAL PRIMARY KEY,
    login         TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    hash_password TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user',
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    phonenumber   TEXT NOT NULL DEFAULT '',
    address       TEXT NOT NULL DEFAULT '',
    avatar_path   TEXT,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Connect, retrying with a fixed backoff while the database comes up.
    ///
    /// Makes `1 + connect_retries` attempts and returns the last error.
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let backoff = Duration::from_secs(config.retry_backoff_secs);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match Self::connect(&config.url, config.max_connections).await {
                Ok(db) => db.health_check().await.map(|_| db),
                Err(e) => Err(e),
            };
            match result {
                Ok(db) => return Ok(db),
                Err(e) if attempt <= config.connect_retries => {
                    tracing::warn!(attempt, error = %e, "database not reachable, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "database not reachable, giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the `users` table if it does not exist.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(USERS_SCHEMA).execute(&self.pool).await?;
        tracing::info!("users schema ready");
        Ok(())
    }
}
