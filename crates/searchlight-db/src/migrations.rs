//! Schema migrations.
//!
//! The SQL files under `migrations/` are embedded at compile time:
//! `001` tenants, users, invites and sessions; `002` audits and the page
//! frontier; `003` platform connections and campaign metrics.

use crate::error::{DatabaseError, Result};
use sqlx::{Pool, Sqlite};

/// Apply every migration not yet recorded in `_sqlx_migrations`.
///
/// # Errors
/// Returns `DatabaseError::Migration` if a migration fails.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    let before = get_schema_version(pool).await?;

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    let after = get_schema_version(pool).await?;
    if after == before {
        tracing::debug!(version = after, "Schema up to date");
    } else {
        tracing::info!(from = before, to = after, "Schema migrated");
    }
    Ok(())
}

/// Highest applied migration, 0 on a fresh database.
///
/// # Errors
/// Returns `DatabaseError` if the catalog cannot be queried.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !tracked {
        return Ok(0);
    }

    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn names(db: &Database, kind: &str) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = ? AND name NOT LIKE 'sqlite_%' \
             AND name != '_sqlx_migrations' ORDER BY name",
        )
        .bind(kind)
        .fetch_all(db.pool())
        .await
        .expect("query catalog")
    }

    #[tokio::test]
    async fn test_fresh_database_is_version_zero() {
        let db = Database::in_memory().await.expect("open database");
        assert_eq!(get_schema_version(db.pool()).await.expect("version"), 0);
    }

    #[tokio::test]
    async fn test_schema_objects() {
        let db = Database::in_memory().await.expect("open database");
        run_migrations(db.pool()).await.expect("run migrations");

        assert_eq!(
            names(&db, "table").await,
            vec![
                "audit_pages",
                "audits",
                "campaign_metrics",
                "invites",
                "organizations",
                "platform_connections",
                "sessions",
                "users"
            ]
        );

        let indexes = names(&db, "index").await;
        // staleness sweeps and frontier batches depend on these
        assert!(indexes.contains(&"idx_audits_status_updated".to_string()));
        assert!(indexes.contains(&"idx_audit_pages_frontier".to_string()));
    }

    #[tokio::test]
    async fn test_rerun_keeps_version() {
        let db = Database::in_memory().await.expect("open database");
        run_migrations(db.pool()).await.expect("first run");
        run_migrations(db.pool()).await.expect("second run");
        assert_eq!(get_schema_version(db.pool()).await.expect("version"), 3);
    }
}
