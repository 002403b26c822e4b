//! Database module for the document generation gateway.
//!
//! Provides the SQLite connection pool, schema migration, and seed data
//! used by the code/rule, audit, and confirmation stores.

pub mod schema;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to `database_url` (a `sqlite:...` URL, or `sqlite::memory:` for
    /// tests), run migrations, and seed the canonical code/rule data.
    pub async fn connect(database_url: &str) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(600))
            .connect(database_url)
            .await?;

        if !database_url.contains(":memory:") {
            sqlx::query("PRAGMA journal_mode = WAL;")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await?;
        }
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.seed().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query(schema::CREATE_TABLES)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        tracing::info!("database migrations completed");
        Ok(())
    }

    async fn seed(&self) -> DbResult<()> {
        for statement in schema::SEED_DATA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Migration(e.to_string()))?;
        }
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
