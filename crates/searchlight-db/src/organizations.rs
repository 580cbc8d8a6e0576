//! Organization (tenant) records.

use crate::error::{DatabaseError, Result};
use searchlight_core::{time, OrganizationId};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A tenant organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    /// Unique identifier
    pub id: OrganizationId,
    /// Display name
    pub name: String,
    /// URL-safe unique handle
    pub slug: String,
    /// Creation time (canonical UTC text)
    pub created_at: String,
    /// Last modification time
    pub updated_at: String,
}

/// Slugs are 3-48 chars of lowercase alphanumerics and inner hyphens.
fn is_valid_slug(slug: &str) -> bool {
    (3..=48).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
}

/// Create a new organization.
///
/// # Errors
/// Returns `DatabaseError::Conflict` when the slug is taken and
/// `DatabaseError::Invalid` when the slug or name is malformed.
pub async fn create_organization(
    pool: &Pool<Sqlite>,
    name: &str,
    slug: &str,
) -> Result<Organization> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DatabaseError::Invalid(
            "organization name must not be empty".to_string(),
        ));
    }
    if !is_valid_slug(slug) {
        return Err(DatabaseError::Invalid(format!(
            "invalid organization slug '{slug}': use 3-48 lowercase letters, digits or hyphens"
        )));
    }

    let id = OrganizationId::generate();
    let now = time::now();

    sqlx::query(
        "INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(name)
    .bind(slug)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_write(e, &format!("organization slug '{slug}'")))?;

    tracing::info!(organization_id = %id, slug, "Organization created");

    Ok(Organization {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get an organization by ID.
pub async fn get(pool: &Pool<Sqlite>, id: &OrganizationId) -> Result<Option<Organization>> {
    let row = sqlx::query(
        "SELECT id, name, slug, created_at, updated_at FROM organizations WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| parse_row(&r)).transpose()
}

/// Rename an organization.
pub async fn rename(pool: &Pool<Sqlite>, id: &OrganizationId, name: &str) -> Result<()> {
    let result = sqlx::query("UPDATE organizations SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name.trim())
        .bind(time::now())
        .bind(id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Organization '{id}' not found"
        )));
    }
    Ok(())
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<Organization> {
    Ok(Organization {
        id: OrganizationId::new(row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[tokio::test]
    async fn test_create_and_get_organization() {
        let db = setup_db().await;

        let org = create_organization(db.pool(), "  Acme Agency ", "acme")
            .await
            .expect("create organization");
        assert_eq!(org.name, "Acme Agency");

        let fetched = get(db.pool(), &org.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fetched, org);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let db = setup_db().await;
        create_organization(db.pool(), "Acme", "acme")
            .await
            .expect("first");

        let result = create_organization(db.pool(), "Acme Two", "acme").await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_slug_rejected() {
        let db = setup_db().await;
        for slug in ["ab", "Acme", "-acme", "acme-", "acme agency"] {
            let result = create_organization(db.pool(), "Acme", slug).await;
            assert!(
                matches!(result, Err(DatabaseError::Invalid(_))),
                "slug {slug:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_rename_missing_organization() {
        let db = setup_db().await;
        let result = rename(db.pool(), &OrganizationId::generate(), "Ghost").await;
        assert!(matches!(result, Err(DatabaseError::NotFoundWithMessage(_))));
    }
}
