//! Team invitations.
//!
//! An invite carries a one-time token. The raw token is returned once from
//! [`create_invite`]; the table only keeps its digest. [`accept`] claims the
//! token and creates the member in one transaction.

use crate::error::{DatabaseError, Result};
use crate::tokens::{generate_token, hash_token};
use crate::users::{self, User};
use chrono::{DateTime, Duration, Utc};
use searchlight_core::{time, OrganizationId, Role, UserId};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A pending or historical invite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invite {
    /// Invite identifier
    pub id: String,
    /// Organization the invitee will join
    pub organization_id: OrganizationId,
    /// Invited email (lowercased)
    pub email: String,
    /// Role granted on acceptance
    pub role: Role,
    /// Member who sent the invite
    pub invited_by: Option<UserId>,
    /// Creation time
    pub created_at: String,
    /// Expiry time
    pub expires_at: String,
    /// Set once accepted
    pub accepted_at: Option<String>,
    /// Set if revoked
    pub revoked_at: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, organization_id, email, role, invited_by, created_at, \
                              expires_at, accepted_at, revoked_at FROM invites";

/// Create an invite and return it together with the raw token.
pub async fn create_invite(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    email: &str,
    role: Role,
    invited_by: Option<&UserId>,
    ttl: Duration,
) -> Result<(Invite, String)> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(DatabaseError::Invalid(format!(
            "invalid email address '{email}'"
        )));
    }

    let token = generate_token();
    let id = uuid::Uuid::new_v4().to_string();
    let created: DateTime<Utc> = Utc::now();
    let created_at = time::format(created);
    let expires_at = time::format(created + ttl);

    sqlx::query(
        "INSERT INTO invites (id, organization_id, email, role, token_hash, invited_by, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(organization_id.as_str())
    .bind(&email)
    .bind(role.as_str())
    .bind(hash_token(&token))
    .bind(invited_by.map(UserId::as_str))
    .bind(&created_at)
    .bind(&expires_at)
    .execute(pool)
    .await?;

    tracing::info!(invite_id = %id, organization_id = %organization_id, role = %role, "Invite created");

    let invite = Invite {
        id,
        organization_id: organization_id.clone(),
        email,
        role,
        invited_by: invited_by.cloned(),
        created_at,
        expires_at,
        accepted_at: None,
        revoked_at: None,
    };
    Ok((invite, token))
}

/// Accept an invite: claim the token and create the invitee's account in one
/// transaction. The claim is a conditional update, so a token admits at most
/// one user and a failed account insert leaves the invite usable.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` for unknown, expired or revoked
/// tokens, `DatabaseError::Conflict` when the invite was already accepted or the
/// email is registered.
pub async fn accept(pool: &Pool<Sqlite>, token: &str, display_name: &str, now: &str) -> Result<(Invite, User)> {
    let token_hash = hash_token(token);
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        "UPDATE invites SET accepted_at = ? WHERE token_hash = ? AND expires_at > ? \
         AND accepted_at IS NULL AND revoked_at IS NULL",
    )
    .bind(now)
    .bind(&token_hash)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE token_hash = ?"))
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;
    let invite = row.map(|r| parse_row(&r)).transpose()?;

    let invite = match invite {
        Some(invite) if claimed.rows_affected() == 1 => invite,
        Some(invite) if invite.revoked_at.is_none() && invite.accepted_at.is_some() => {
            return Err(DatabaseError::Conflict(format!(
                "invite '{}' was already accepted",
                invite.id
            )));
        }
        _ => {
            return Err(DatabaseError::NotFoundWithMessage(
                "Invite not found or expired".to_string(),
            ));
        }
    };

    let user = users::insert(
        &mut *tx,
        &invite.organization_id,
        &invite.email,
        display_name,
        invite.role,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(invite_id = %invite.id, user_id = %user.id, "Invite accepted");
    Ok((invite, user))
}

/// Invites of an organization that can still be accepted.
pub async fn list_pending(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    now: &str,
) -> Result<Vec<Invite>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE organization_id = ? AND expires_at > ? \
         AND accepted_at IS NULL AND revoked_at IS NULL ORDER BY created_at DESC"
    ))
    .bind(organization_id.as_str())
    .bind(now)
    .fetch_all(pool)
    .await?;
    rows.iter().map(parse_row).collect()
}

/// Revoke an unaccepted invite.
pub async fn revoke(pool: &Pool<Sqlite>, organization_id: &OrganizationId, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE invites SET revoked_at = ? WHERE id = ? AND organization_id = ? \
         AND accepted_at IS NULL AND revoked_at IS NULL",
    )
    .bind(time::now())
    .bind(id)
    .bind(organization_id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Pending invite '{id}' not found"
        )));
    }
    Ok(())
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<Invite> {
    let invited_by: Option<String> = row.try_get("invited_by")?;
    Ok(Invite {
        id: row.try_get("id")?,
        organization_id: OrganizationId::new(row.try_get::<String, _>("organization_id")?)?,
        email: row.try_get("email")?,
        role: Role::parse(&row.try_get::<String, _>("role")?)?,
        invited_by: invited_by.map(UserId::new).transpose()?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        accepted_at: row.try_get("accepted_at")?,
        revoked_at: row.try_get("revoked_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_org, setup_db};

    #[tokio::test]
    async fn test_token_admits_one_member() {
        let db = setup_db().await;
        let (org, owner) = seed_org(&db, "acme").await;

        let (invite, token) = create_invite(
            db.pool(),
            &org,
            "New@Acme.test",
            Role::TeamMember,
            Some(&owner),
            Duration::days(7),
        )
        .await
        .expect("create invite");
        assert_eq!(invite.email, "new@acme.test");

        let now = time::now();
        let (accepted, user) = accept(db.pool(), &token, " Newbie ", &now)
            .await
            .expect("accept");
        assert_eq!(accepted.id, invite.id);
        assert_eq!(accepted.invited_by, Some(owner));
        assert_eq!(accepted.accepted_at.as_deref(), Some(now.as_str()));
        assert_eq!(user.organization_id, org);
        assert_eq!(user.role, Role::TeamMember);
        assert_eq!(user.display_name, "Newbie");

        let again = accept(db.pool(), &token, "Newbie", &now).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));
        assert!(list_pending(db.pool(), &org, &now).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_accepts_create_one_member() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let (_, token) =
            create_invite(db.pool(), &org, "race@acme.test", Role::ClientViewer, None, Duration::days(7))
                .await
                .expect("create");

        let now = time::now();
        let (a, b) = tokio::join!(
            accept(db.pool(), &token, "First", &now),
            accept(db.pool(), &token, "Second", &now),
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(matches!(a.err().or(b.err()), Some(DatabaseError::Conflict(_))));

        let members = users::list_by_organization(db.pool(), &org).await.expect("members");
        assert_eq!(members.iter().filter(|u| u.email == "race@acme.test").count(), 1);
    }

    #[tokio::test]
    async fn test_failed_account_insert_leaves_invite_usable() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let (invite, token) =
            create_invite(db.pool(), &org, "taken@acme.test", Role::TeamMember, None, Duration::days(7))
                .await
                .expect("create");
        let existing = users::create_user(db.pool(), &org, "taken@acme.test", "Taken", Role::TeamMember)
            .await
            .expect("create user");

        let now = time::now();
        let result = accept(db.pool(), &token, "Taken again", &now).await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
        let pending = list_pending(db.pool(), &org, &now).await.expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, invite.id);

        // once the clashing account is gone the same token still works
        users::delete(db.pool(), &org, &existing.id).await.expect("delete");
        accept(db.pool(), &token, "Taken again", &now).await.expect("accept");
    }

    #[tokio::test]
    async fn test_expired_invite_is_not_found() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let (_, token) = create_invite(db.pool(), &org, "late@acme.test", Role::ClientViewer, None, Duration::days(1))
            .await
            .expect("create");

        let later = time::format(Utc::now() + Duration::days(2));
        assert!(matches!(
            accept(db.pool(), &token, "Late", &later).await,
            Err(DatabaseError::NotFoundWithMessage(_))
        ));
        assert!(list_pending(db.pool(), &org, &later).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_revoke_blocks_acceptance() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let (invite, token) =
            create_invite(db.pool(), &org, "x@acme.test", Role::TeamMember, None, Duration::days(7))
                .await
                .expect("create");

        assert_eq!(list_pending(db.pool(), &org, &time::now()).await.expect("list").len(), 1);
        revoke(db.pool(), &org, &invite.id).await.expect("revoke");

        assert!(matches!(
            accept(db.pool(), &token, "X", &time::now()).await,
            Err(DatabaseError::NotFoundWithMessage(_))
        ));
        assert!(matches!(
            revoke(db.pool(), &org, &invite.id).await,
            Err(DatabaseError::NotFoundWithMessage(_))
        ));
    }
}
