//! Team members of an organization.

use crate::error::{DatabaseError, Result};
use searchlight_core::{time, OrganizationId, Role, UserId};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, Row, Sqlite};

/// A user account. Every user belongs to exactly one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Lowercased, globally unique email
    pub email: String,
    /// Name shown in the team list
    pub display_name: String,
    /// Role inside the organization
    pub role: Role,
    /// Creation time
    pub created_at: String,
}

const SELECT_COLUMNS: &str = "SELECT id, organization_id, email, display_name, role, created_at FROM users";

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(DatabaseError::Invalid(format!("invalid email address '{email}'")))
    }
}

/// Create a user in an organization.
///
/// # Errors
/// Returns `DatabaseError::Conflict` when the email is already registered.
pub async fn create_user(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    email: &str,
    display_name: &str,
    role: Role,
) -> Result<User> {
    insert(pool, organization_id, email, display_name, role).await
}

/// [`create_user`] on any executor, so other writes can share its transaction.
pub(crate) async fn insert<'e, E>(
    executor: E,
    organization_id: &OrganizationId,
    email: &str,
    display_name: &str,
    role: Role,
) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let email = normalize_email(email)?;
    let id = UserId::generate();
    let now = time::now();

    sqlx::query(
        "INSERT INTO users (id, organization_id, email, display_name, role, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(organization_id.as_str())
    .bind(&email)
    .bind(display_name.trim())
    .bind(role.as_str())
    .bind(&now)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::from_write(e, &format!("user '{email}'")))?;

    tracing::info!(user_id = %id, organization_id = %organization_id, role = %role, "User created");

    Ok(User {
        id,
        organization_id: organization_id.clone(),
        email,
        display_name: display_name.trim().to_string(),
        role,
        created_at: now,
    })
}

/// Get a user by ID.
pub async fn get(pool: &Pool<Sqlite>, id: &UserId) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;
    row.map(|r| parse_row(&r)).transpose()
}

/// Get a user by email (case-insensitive).
pub async fn get_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE email = ?"))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    row.map(|r| parse_row(&r)).transpose()
}

/// List the members of an organization, oldest first.
pub async fn list_by_organization(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE organization_id = ? ORDER BY created_at ASC, email ASC"
    ))
    .bind(organization_id.as_str())
    .fetch_all(pool)
    .await?;
    rows.iter().map(parse_row).collect()
}

/// Guard appended to writes that would take away an admin: the row matches
/// only while it is not an admin or another admin remains.
const KEEPS_AN_ADMIN: &str = "(role <> 'admin' OR \
     (SELECT COUNT(*) FROM users WHERE organization_id = ? AND role = 'admin') > 1)";

/// Change a member's role.
///
/// # Errors
/// Returns `DatabaseError::Conflict` when this would demote the organization's
/// last admin, `DatabaseError::NotFoundWithMessage` when no such member exists.
pub async fn update_role(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    id: &UserId,
    role: Role,
) -> Result<()> {
    let result = sqlx::query(&format!(
        "UPDATE users SET role = ? WHERE id = ? AND organization_id = ? \
         AND (? = 'admin' OR {KEEPS_AN_ADMIN})"
    ))
    .bind(role.as_str())
    .bind(id.as_str())
    .bind(organization_id.as_str())
    .bind(role.as_str())
    .bind(organization_id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(unmatched(pool, organization_id, id).await);
    }
    tracing::info!(user_id = %id, role = %role, "User role updated");
    Ok(())
}

/// Remove a member from an organization. Their sessions go with them.
///
/// # Errors
/// Returns `DatabaseError::Conflict` when the member is the organization's
/// last admin, `DatabaseError::NotFoundWithMessage` when no such member exists.
pub async fn delete(pool: &Pool<Sqlite>, organization_id: &OrganizationId, id: &UserId) -> Result<()> {
    let result = sqlx::query(&format!(
        "DELETE FROM users WHERE id = ? AND organization_id = ? AND {KEEPS_AN_ADMIN}"
    ))
    .bind(id.as_str())
    .bind(organization_id.as_str())
    .bind(organization_id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(unmatched(pool, organization_id, id).await);
    }
    tracing::info!(user_id = %id, "User deleted");
    Ok(())
}

/// Why a guarded write matched no row.
async fn unmatched(pool: &Pool<Sqlite>, organization_id: &OrganizationId, id: &UserId) -> DatabaseError {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE id = ? AND organization_id = ?)",
    )
    .bind(id.as_str())
    .bind(organization_id.as_str())
    .fetch_one(pool)
    .await;

    match exists {
        Ok(true) => DatabaseError::Conflict("an organization must keep at least one admin".to_string()),
        Ok(false) => DatabaseError::NotFoundWithMessage(format!("User '{id}' not found")),
        Err(e) => e.into(),
    }
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get::<String, _>("id")?)?,
        organization_id: OrganizationId::new(row.try_get::<String, _>("organization_id")?)?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        role: Role::parse(&row.try_get::<String, _>("role")?)?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_org, setup_db};

    async fn count_admins(pool: &Pool<Sqlite>, organization_id: &OrganizationId) -> Result<usize> {
        let members = list_by_organization(pool, organization_id).await?;
        Ok(members.iter().filter(|u| u.role == Role::Admin).count())
    }

    #[tokio::test]
    async fn test_email_is_lowercased_and_unique() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;

        let user = create_user(db.pool(), &org, " Jane@Example.COM ", "Jane", Role::TeamMember)
            .await
            .expect("create user");
        assert_eq!(user.email, "jane@example.com");

        let dup = create_user(db.pool(), &org, "jane@example.com", "Jane 2", Role::ClientViewer).await;
        assert!(matches!(dup, Err(DatabaseError::Conflict(_))));

        let found = get_by_email(db.pool(), "JANE@example.com")
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let result = create_user(db.pool(), &org, "not-an-email", "X", Role::TeamMember).await;
        assert!(matches!(result, Err(DatabaseError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_list_and_count_admins() {
        let db = setup_db().await;
        let (org, owner) = seed_org(&db, "acme").await;
        let (other_org, _) = seed_org(&db, "other").await;

        let member = create_user(db.pool(), &org, "dev@acme.test", "Dev", Role::ExternalDeveloper)
            .await
            .expect("create");

        let members = list_by_organization(db.pool(), &org).await.expect("list");
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|u| u.organization_id == org));
        assert_eq!(count_admins(db.pool(), &org).await.expect("count"), 1);

        update_role(db.pool(), &org, &member.id, Role::Admin)
            .await
            .expect("promote");
        assert_eq!(count_admins(db.pool(), &org).await.expect("count"), 2);

        // Cross-tenant updates do not match any row
        let cross = update_role(db.pool(), &other_org, &owner, Role::ClientViewer).await;
        assert!(matches!(cross, Err(DatabaseError::NotFoundWithMessage(_))));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let user = create_user(db.pool(), &org, "temp@acme.test", "Temp", Role::ClientViewer)
            .await
            .expect("create");

        delete(db.pool(), &org, &user.id).await.expect("delete");
        assert!(get(db.pool(), &user.id).await.expect("get").is_none());

        let again = delete(db.pool(), &org, &user.id).await;
        assert!(matches!(again, Err(DatabaseError::NotFoundWithMessage(_))));
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_demoted_or_removed() {
        let db = setup_db().await;
        let (org, owner) = seed_org(&db, "acme").await;

        let demote = update_role(db.pool(), &org, &owner, Role::TeamMember).await;
        assert!(matches!(demote, Err(DatabaseError::Conflict(_))));
        let remove = delete(db.pool(), &org, &owner).await;
        assert!(matches!(remove, Err(DatabaseError::Conflict(_))));

        // re-asserting the admin role is not a demotion
        update_role(db.pool(), &org, &owner, Role::Admin)
            .await
            .expect("keep admin");
        assert_eq!(count_admins(db.pool(), &org).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_admin_demotions_keep_one_admin() {
        let db = setup_db().await;
        let (org, owner) = seed_org(&db, "acme").await;
        let second = create_user(db.pool(), &org, "ops@acme.test", "Ops", Role::Admin)
            .await
            .expect("create");

        let (a, b) = tokio::join!(
            update_role(db.pool(), &org, &owner, Role::TeamMember),
            delete(db.pool(), &org, &second.id),
        );
        assert_eq!(
            usize::from(a.is_ok()) + usize::from(b.is_ok()),
            1,
            "exactly one write wins: {a:?} {b:?}"
        );
        assert!(matches!(a.err().or(b.err()), Some(DatabaseError::Conflict(_))));
        assert_eq!(count_admins(db.pool(), &org).await.expect("count"), 1);
    }
}
