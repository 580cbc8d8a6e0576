//! Searchlight Database Layer
//!
//! Provides `SQLite` access through `SQLx` with embedded migrations. Each table
//! has its own module exposing free functions over a `&Pool<Sqlite>`.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Connection Pooling**: Configurable pool; in-memory databases use a single
//!   connection that is never recycled
//! - **Timestamps**: stored as canonical UTC text (see `searchlight_core::time`)
//!   so range predicates work as plain string comparisons
//! - **Claims**: audit state transitions are conditional updates; callers check
//!   `rows_affected` to learn whether they won
//!
//! # Example
//!
//! ```ignore
//! use searchlight_db::Database;
//!
//! let db = Database::connect("sqlite:searchlight.db?mode=rwc", 5).await?;
//! db.run_migrations().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod audit_pages;
/// Audit rows and their claim/heartbeat/staleness transitions.
pub mod audits;
pub mod error;
pub mod invites;
pub mod metrics;
pub mod migrations;
pub mod organizations;
pub mod sessions;
pub mod tokens;
pub mod users;

// Re-export commonly used types
pub use error::{DatabaseError, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// High-level database interface wrapping the connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open a database from a `SQLite` URL.
    ///
    /// The file is created if missing. In-memory URLs are routed through
    /// [`Database::in_memory`] semantics (one long-lived connection), since
    /// every new in-memory connection would otherwise see an empty database.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the URL is malformed or the pool
    /// cannot be created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        let connect_options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool_options = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

        tracing::info!(memory = is_memory, "Database pool created");

        Ok(Self { pool })
    }

    /// Open a private in-memory database (used by tests and demos).
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Check that the database answers queries.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

/// Shared fixtures for this crate's unit tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use searchlight_core::{OrganizationId, Role, UserId};

    pub async fn setup_db() -> Database {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    pub async fn seed_org(db: &Database, slug: &str) -> (OrganizationId, UserId) {
        let org = crate::organizations::create_organization(db.pool(), "Acme Agency", slug)
            .await
            .expect("create organization");
        let user = crate::users::create_user(
            db.pool(),
            &org.id,
            &format!("owner@{slug}.test"),
            "Owner",
            Role::Admin,
        )
        .await
        .expect("create user");
        (org.id, user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::in_memory().await.expect("create database");
        db.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn test_database_migrations() {
        let db = Database::in_memory().await.expect("create database");
        assert_eq!(db.get_schema_version().await.expect("get version"), 0);

        db.run_migrations().await.expect("run migrations");
        assert_eq!(db.get_schema_version().await.expect("get version"), 3);
    }

    #[tokio::test]
    async fn test_in_memory_state_survives_across_queries() {
        let db = test_support::setup_db().await;
        test_support::seed_org(&db, "acme").await;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(db.pool())
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let result = Database::connect("postgres://nope", 1).await;
        assert!(matches!(result, Err(DatabaseError::Open(_))));
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::in_memory().await.expect("create database");
        db.close().await;
    }
}
