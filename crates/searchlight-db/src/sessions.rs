//! Bearer sessions.

use crate::error::Result;
use crate::tokens::{generate_token, hash_token};
use crate::users::{self, User};
use chrono::{Duration, Utc};
use searchlight_core::{time, UserId};
use sqlx::{Pool, Sqlite};

/// Open a session for a user and return the raw bearer token.
pub async fn create_session(pool: &Pool<Sqlite>, user_id: &UserId, ttl: Duration) -> Result<String> {
    let token = generate_token();
    let created = Utc::now();

    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(hash_token(&token))
        .bind(user_id.as_str())
        .bind(time::format(created))
        .bind(time::format(created + ttl))
        .execute(pool)
        .await?;

    tracing::debug!(user_id = %user_id, "Session created");
    Ok(token)
}

/// Resolve a bearer token to its user, if the session is still valid.
pub async fn resolve(pool: &Pool<Sqlite>, token: &str, now: &str) -> Result<Option<User>> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(hash_token(token))
            .bind(now)
            .fetch_optional(pool)
            .await?;

    match user_id {
        Some(id) => users::get(pool, &UserId::new(id)?).await,
        None => Ok(None),
    }
}

/// Revoke a session. Unknown tokens are ignored.
pub async fn revoke(pool: &Pool<Sqlite>, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete expired sessions, returning how many were removed.
pub async fn purge_expired(pool: &Pool<Sqlite>, now: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        tracing::info!(purged = result.rows_affected(), "Expired sessions purged");
    }
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_org, setup_db};

    #[tokio::test]
    async fn test_session_resolves_until_expiry() {
        let db = setup_db().await;
        let (_, user) = seed_org(&db, "acme").await;

        let token = create_session(db.pool(), &user, Duration::hours(1))
            .await
            .expect("create session");

        let resolved = resolve(db.pool(), &token, &time::now())
            .await
            .expect("resolve")
            .expect("valid session");
        assert_eq!(resolved.id, user);

        let later = time::format(Utc::now() + Duration::hours(2));
        assert!(resolve(db.pool(), &token, &later).await.expect("resolve").is_none());
        assert_eq!(purge_expired(db.pool(), &later).await.expect("purge"), 1);
    }

    #[tokio::test]
    async fn test_revoke_and_unknown_token() {
        let db = setup_db().await;
        let (_, user) = seed_org(&db, "acme").await;
        let token = create_session(db.pool(), &user, Duration::hours(1))
            .await
            .expect("create");

        revoke(db.pool(), &token).await.expect("revoke");
        let now = time::now();
        assert!(resolve(db.pool(), &token, &now).await.expect("resolve").is_none());
        assert!(resolve(db.pool(), "bogus", &now).await.expect("resolve").is_none());
    }
}
