//! Audit rows and their state transitions.
//!
//! Every transition is a single conditional `UPDATE`; the caller learns whether
//! it won from `rows_affected`. A worker that claims a batch receives a claim
//! token, and its later writes only land while that token is still current.

use crate::error::{DatabaseError, Result};
use crate::tokens::generate_token;
use searchlight_core::{time, AuditId, AuditKind, AuditStatus, OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// An audit run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Audit {
    /// Unique identifier
    pub id: AuditId,
    /// Owning tenant
    pub organization_id: OrganizationId,
    /// Member who started it
    pub created_by: Option<UserId>,
    /// Root URL being audited
    pub target_url: String,
    /// SEO or GEO
    pub kind: AuditKind,
    /// Current lifecycle state
    pub status: AuditStatus,
    /// Upper bound on pages crawled
    pub max_pages: i64,
    /// Pages crawled so far
    pub pages_crawled: i64,
    /// Number of batches claimed so far
    pub batch_count: i64,
    /// Overall score once completed
    pub overall_score: Option<i64>,
    /// Summary document once completed
    pub summary: Option<serde_json::Value>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Creation time
    pub created_at: String,
    /// Last state change or heartbeat
    pub updated_at: String,
    /// First claim time
    pub started_at: Option<String>,
    /// Terminal transition time
    pub completed_at: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, organization_id, created_by, target_url, kind, status, \
    max_pages, pages_crawled, batch_count, overall_score, summary, error_message, \
    created_at, updated_at, started_at, completed_at FROM audits";

const IN_PROGRESS_SQL: &str = "('pending', 'crawling', 'batch_complete')";

/// Create a pending audit.
pub async fn create_audit(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    created_by: Option<&UserId>,
    target_url: &str,
    kind: AuditKind,
    max_pages: i64,
) -> Result<Audit> {
    if max_pages < 1 {
        return Err(DatabaseError::Invalid(format!(
            "max_pages must be at least 1, got {max_pages}"
        )));
    }

    let id = AuditId::generate();
    let now = time::now();

    sqlx::query(
        "INSERT INTO audits (id, organization_id, created_by, target_url, kind, status, max_pages, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(organization_id.as_str())
    .bind(created_by.map(UserId::as_str))
    .bind(target_url)
    .bind(kind.as_str())
    .bind(max_pages)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(audit_id = %id, organization_id = %organization_id, kind = %kind, target_url, "Audit created");

    Ok(Audit {
        id,
        organization_id: organization_id.clone(),
        created_by: created_by.cloned(),
        target_url: target_url.to_string(),
        kind,
        status: AuditStatus::Pending,
        max_pages,
        pages_crawled: 0,
        batch_count: 0,
        overall_score: None,
        summary: None,
        error_message: None,
        created_at: now.clone(),
        updated_at: now,
        started_at: None,
        completed_at: None,
    })
}

/// Get an audit by ID.
pub async fn get(pool: &Pool<Sqlite>, id: &AuditId) -> Result<Option<Audit>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;
    row.map(|r| parse_row(&r)).transpose()
}

/// Most recent audits of an organization.
pub async fn list_by_organization(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    limit: i64,
) -> Result<Vec<Audit>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE organization_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
    ))
    .bind(organization_id.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(parse_row).collect()
}

/// Most recent audit of an organization that is still in progress.
pub async fn find_active(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
) -> Result<Option<Audit>> {
    let row = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE organization_id = ? AND status IN {IN_PROGRESS_SQL} \
         ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(organization_id.as_str())
    .fetch_optional(pool)
    .await?;
    row.map(|r| parse_row(&r)).transpose()
}

/// An in-progress audit of `target_url`, if the organization has one.
pub async fn find_in_progress_for_target(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    target_url: &str,
) -> Result<Option<Audit>> {
    let row = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE organization_id = ? AND target_url = ? \
         AND status IN {IN_PROGRESS_SQL} ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(organization_id.as_str())
    .bind(target_url)
    .fetch_optional(pool)
    .await?;
    row.map(|r| parse_row(&r)).transpose()
}

/// Claim the next batch of an audit.
///
/// Moves `pending`/`batch_complete` to `crawling` and returns a fresh claim
/// token. Returns `None` when the audit is not claimable, which includes the
/// case where a concurrent caller claimed it first.
pub async fn claim(pool: &Pool<Sqlite>, id: &AuditId, now: &str) -> Result<Option<String>> {
    let token = generate_token();
    let result = sqlx::query(
        "UPDATE audits SET status = 'crawling', claim_token = ?, batch_count = batch_count + 1, \
         started_at = COALESCE(started_at, ?), updated_at = ? \
         WHERE id = ? AND status IN ('pending', 'batch_complete')",
    )
    .bind(&token)
    .bind(now)
    .bind(now)
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        tracing::debug!(audit_id = %id, "Batch claimed");
        Ok(Some(token))
    } else {
        Ok(None)
    }
}

/// Record progress under a claim.
///
/// Refreshes `updated_at` and the crawled page count. Returns `false` when the
/// claim is no longer held (cancelled, failed by the sweeper, or re-claimed).
pub async fn heartbeat(pool: &Pool<Sqlite>, id: &AuditId, token: &str, now: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE audits SET updated_at = ?, pages_crawled = \
         (SELECT COUNT(*) FROM audit_pages WHERE audit_id = audits.id AND status = 'crawled') \
         WHERE id = ? AND status = 'crawling' AND claim_token = ?",
    )
    .bind(now)
    .bind(id.as_str())
    .bind(token)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// End a batch that left work outstanding: `crawling` → `batch_complete`.
pub async fn release_batch(
    pool: &Pool<Sqlite>,
    id: &AuditId,
    token: &str,
    pages_crawled: i64,
    now: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE audits SET status = 'batch_complete', claim_token = NULL, pages_crawled = ?, updated_at = ? \
         WHERE id = ? AND status = 'crawling' AND claim_token = ?",
    )
    .bind(pages_crawled)
    .bind(now)
    .bind(id.as_str())
    .bind(token)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Finish an audit: `crawling` → `completed`.
pub async fn complete(
    pool: &Pool<Sqlite>,
    id: &AuditId,
    token: &str,
    pages_crawled: i64,
    overall_score: Option<i64>,
    summary: &serde_json::Value,
    now: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE audits SET status = 'completed', claim_token = NULL, pages_crawled = ?, \
         overall_score = ?, summary = ?, updated_at = ?, completed_at = ? \
         WHERE id = ? AND status = 'crawling' AND claim_token = ?",
    )
    .bind(pages_crawled)
    .bind(overall_score)
    .bind(serde_json::to_string(summary)?)
    .bind(now)
    .bind(now)
    .bind(id.as_str())
    .bind(token)
    .execute(pool)
    .await?;

    let won = result.rows_affected() == 1;
    if won {
        tracing::info!(audit_id = %id, pages_crawled, score = ?overall_score, "Audit completed");
    }
    Ok(won)
}

/// Fail an audit from the worker holding its claim.
pub async fn fail_claimed(
    pool: &Pool<Sqlite>,
    id: &AuditId,
    token: &str,
    message: &str,
    now: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE audits SET status = 'failed', claim_token = NULL, error_message = ?, \
         updated_at = ?, completed_at = ? \
         WHERE id = ? AND status = 'crawling' AND claim_token = ?",
    )
    .bind(message)
    .bind(now)
    .bind(now)
    .bind(id.as_str())
    .bind(token)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Cancel an audit that has not reached a terminal state.
pub async fn cancel(pool: &Pool<Sqlite>, id: &AuditId, now: &str) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE audits SET status = 'cancelled', claim_token = NULL, updated_at = ?, completed_at = ? \
         WHERE id = ? AND status IN {IN_PROGRESS_SQL}"
    ))
    .bind(now)
    .bind(now)
    .bind(id.as_str())
    .execute(pool)
    .await?;

    let won = result.rows_affected() == 1;
    if won {
        tracing::info!(audit_id = %id, "Audit cancelled");
    }
    Ok(won)
}

/// In-progress audits not updated since `cutoff`, optionally for one tenant.
pub async fn find_stale(
    pool: &Pool<Sqlite>,
    cutoff: &str,
    organization_id: Option<&OrganizationId>,
) -> Result<Vec<Audit>> {
    find_idle(pool, IN_PROGRESS_SQL, cutoff, organization_id).await
}

/// Claimable audits idle since before `cutoff`, optionally for one tenant.
///
/// These are waiting on a continuation that may never arrive.
pub async fn find_resumable(
    pool: &Pool<Sqlite>,
    cutoff: &str,
    organization_id: Option<&OrganizationId>,
) -> Result<Vec<Audit>> {
    find_idle(pool, "('pending', 'batch_complete')", cutoff, organization_id).await
}

async fn find_idle(
    pool: &Pool<Sqlite>,
    statuses: &str,
    cutoff: &str,
    organization_id: Option<&OrganizationId>,
) -> Result<Vec<Audit>> {
    let rows = match organization_id {
        Some(org) => {
            sqlx::query(&format!(
                "{SELECT_COLUMNS} WHERE status IN {statuses} AND updated_at < ? \
                 AND organization_id = ? ORDER BY updated_at ASC"
            ))
            .bind(cutoff)
            .bind(org.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "{SELECT_COLUMNS} WHERE status IN {statuses} AND updated_at < ? ORDER BY updated_at ASC"
            ))
            .bind(cutoff)
            .fetch_all(pool)
            .await?
        }
    };
    rows.iter().map(parse_row).collect()
}

/// Fail an in-progress audit only if it has not moved since it was observed.
///
/// A heartbeat landing between observation and this call changes
/// `updated_at`, so the update matches nothing and the audit survives.
pub async fn fail_if_stale(
    pool: &Pool<Sqlite>,
    id: &AuditId,
    observed_updated_at: &str,
    message: &str,
    now: &str,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE audits SET status = 'failed', claim_token = NULL, error_message = ?, \
         updated_at = ?, completed_at = ? \
         WHERE id = ? AND updated_at = ? AND status IN {IN_PROGRESS_SQL}"
    ))
    .bind(message)
    .bind(now)
    .bind(now)
    .bind(id.as_str())
    .bind(observed_updated_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<Audit> {
    let created_by: Option<String> = row.try_get("created_by")?;
    let summary: Option<String> = row.try_get("summary")?;
    Ok(Audit {
        id: AuditId::new(row.try_get::<String, _>("id")?)?,
        organization_id: OrganizationId::new(row.try_get::<String, _>("organization_id")?)?,
        created_by: created_by.map(UserId::new).transpose()?,
        target_url: row.try_get("target_url")?,
        kind: AuditKind::parse(&row.try_get::<String, _>("kind")?)?,
        status: AuditStatus::parse(&row.try_get::<String, _>("status")?)?,
        max_pages: row.try_get("max_pages")?,
        pages_crawled: row.try_get("pages_crawled")?,
        batch_count: row.try_get("batch_count")?,
        overall_score: row.try_get("overall_score")?,
        summary: summary.as_deref().map(serde_json::from_str).transpose()?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_org, setup_db};
    use crate::Database;

    const T0: &str = "2026-03-01T10:00:00.000Z";
    const T1: &str = "2026-03-01T10:01:00.000Z";
    const T2: &str = "2026-03-01T10:02:00.000Z";
    const T3: &str = "2026-03-01T10:30:00.000Z";

    async fn new_audit(db: &Database) -> Audit {
        let (org, user) = seed_org(db, "acme").await;
        create_audit(db.pool(), &org, Some(&user), "https://acme.test/", AuditKind::Seo, 20)
            .await
            .expect("create audit")
    }

    async fn status_of(db: &Database, id: &AuditId) -> AuditStatus {
        get(db.pool(), id).await.expect("get").expect("exists").status
    }

    #[tokio::test]
    async fn test_create_audit_is_pending() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;
        assert_eq!(audit.status, AuditStatus::Pending);

        let fetched = get(db.pool(), &audit.id).await.expect("get").expect("exists");
        assert_eq!(fetched, audit);

        let active = find_active(db.pool(), &audit.organization_id)
            .await
            .expect("find active")
            .expect("active audit");
        assert_eq!(active.id, audit.id);
    }

    #[tokio::test]
    async fn test_in_progress_lookup_by_target() {
        let db = setup_db().await;
        let (org, user) = seed_org(&db, "acme").await;
        let (other_org, _) = seed_org(&db, "other").await;
        let first = create_audit(db.pool(), &org, Some(&user), "https://acme.test/", AuditKind::Seo, 20)
            .await
            .expect("create");
        create_audit(db.pool(), &org, Some(&user), "https://blog.acme.test/", AuditKind::Geo, 20)
            .await
            .expect("create newer");

        // the newer audit of another site does not hide the older one
        let found = find_in_progress_for_target(db.pool(), &org, "https://acme.test/")
            .await
            .expect("lookup")
            .expect("in progress");
        assert_eq!(found.id, first.id);
        assert!(find_in_progress_for_target(db.pool(), &other_org, "https://acme.test/")
            .await
            .expect("lookup")
            .is_none());

        assert!(cancel(db.pool(), &first.id, &time::now()).await.expect("cancel"));
        assert!(find_in_progress_for_target(db.pool(), &org, "https://acme.test/")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn test_zero_max_pages_rejected() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        let result = create_audit(db.pool(), &org, None, "https://acme.test/", AuditKind::Geo, 0).await;
        assert!(matches!(result, Err(DatabaseError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_only_one_claim_wins() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = db.pool().clone();
            let id = audit.id.clone();
            handles.push(tokio::spawn(async move { claim(&pool, &id, T0).await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("join").expect("claim").is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let claimed = get(db.pool(), &audit.id).await.expect("get").expect("exists");
        assert_eq!(claimed.status, AuditStatus::Crawling);
        assert_eq!(claimed.batch_count, 1);
        assert_eq!(claimed.started_at.as_deref(), Some(T0));
    }

    #[tokio::test]
    async fn test_batch_cycle_under_token() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;

        let token = claim(db.pool(), &audit.id, T0).await.expect("claim").expect("won");
        assert!(heartbeat(db.pool(), &audit.id, &token, T1).await.expect("heartbeat"));
        assert!(!heartbeat(db.pool(), &audit.id, "wrong", T1).await.expect("heartbeat"));

        assert!(release_batch(db.pool(), &audit.id, &token, 10, T1).await.expect("release"));
        assert_eq!(status_of(&db, &audit.id).await, AuditStatus::BatchComplete);

        // The old token is dead after release
        assert!(!heartbeat(db.pool(), &audit.id, &token, T2).await.expect("heartbeat"));

        let second = claim(db.pool(), &audit.id, T2).await.expect("claim").expect("won");
        assert_ne!(second, token);

        let summary = serde_json::json!({ "pages": 20 });
        assert!(!complete(db.pool(), &audit.id, &token, 20, Some(80), &summary, T3)
            .await
            .expect("stale complete"));
        assert!(complete(db.pool(), &audit.id, &second, 20, Some(80), &summary, T3)
            .await
            .expect("complete"));

        let done = get(db.pool(), &audit.id).await.expect("get").expect("exists");
        assert_eq!(done.status, AuditStatus::Completed);
        assert_eq!(done.batch_count, 2);
        assert_eq!(done.overall_score, Some(80));
        assert_eq!(done.summary, Some(summary));
        assert_eq!(done.completed_at.as_deref(), Some(T3));

        // Terminal audits cannot be claimed or cancelled
        assert!(claim(db.pool(), &audit.id, T3).await.expect("claim").is_none());
        assert!(!cancel(db.pool(), &audit.id, T3).await.expect("cancel"));
        assert!(find_active(db.pool(), &audit.organization_id).await.expect("active").is_none());
    }

    #[tokio::test]
    async fn test_cancel_revokes_claim() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;
        let token = claim(db.pool(), &audit.id, T0).await.expect("claim").expect("won");

        assert!(cancel(db.pool(), &audit.id, T1).await.expect("cancel"));
        assert!(!heartbeat(db.pool(), &audit.id, &token, T2).await.expect("heartbeat"));
        assert!(!fail_claimed(db.pool(), &audit.id, &token, "boom", T2).await.expect("fail"));
        assert_eq!(status_of(&db, &audit.id).await, AuditStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fail_claimed_records_message() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;
        let token = claim(db.pool(), &audit.id, T0).await.expect("claim").expect("won");

        assert!(fail_claimed(db.pool(), &audit.id, &token, "fetch exploded", T1)
            .await
            .expect("fail"));
        let failed = get(db.pool(), &audit.id).await.expect("get").expect("exists");
        assert_eq!(failed.status, AuditStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("fetch exploded"));
    }

    #[tokio::test]
    async fn test_stale_fail_respects_heartbeat() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;
        let token = claim(db.pool(), &audit.id, T0).await.expect("claim").expect("won");

        let stale = find_stale(db.pool(), T2, None).await.expect("find stale");
        assert_eq!(stale.len(), 1);
        let observed = stale[0].updated_at.clone();
        assert_eq!(observed, T0);

        // A heartbeat lands after the sweep looked
        assert!(heartbeat(db.pool(), &audit.id, &token, T1).await.expect("heartbeat"));
        assert!(!fail_if_stale(db.pool(), &audit.id, &observed, "timed out", T3)
            .await
            .expect("fail if stale"));
        assert_eq!(status_of(&db, &audit.id).await, AuditStatus::Crawling);

        // Observing again and failing with no intervening write succeeds
        assert!(fail_if_stale(db.pool(), &audit.id, T1, "timed out", T3)
            .await
            .expect("fail if stale"));
        let failed = get(db.pool(), &audit.id).await.expect("get").expect("exists");
        assert_eq!(failed.status, AuditStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("timed out"));
        assert!(!heartbeat(db.pool(), &audit.id, &token, T3).await.expect("heartbeat"));
    }

    #[tokio::test]
    async fn test_find_resumable_and_tenant_filter() {
        let db = setup_db().await;
        let audit = new_audit(&db).await;
        let (other_org, _) = seed_org(&db, "other").await;

        let resumable = find_resumable(db.pool(), "9999-01-01T00:00:00.000Z", None)
            .await
            .expect("find");
        assert_eq!(resumable.len(), 1);

        let scoped = find_resumable(db.pool(), "9999-01-01T00:00:00.000Z", Some(&other_org))
            .await
            .expect("find");
        assert!(scoped.is_empty());

        // Crawling audits are not resumable
        claim(db.pool(), &audit.id, T0).await.expect("claim");
        assert!(find_resumable(db.pool(), "9999-01-01T00:00:00.000Z", None)
            .await
            .expect("find")
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_by_organization_limit() {
        let db = setup_db().await;
        let (org, _) = seed_org(&db, "acme").await;
        for _ in 0..3 {
            create_audit(db.pool(), &org, None, "https://acme.test/", AuditKind::Seo, 5)
                .await
                .expect("create");
        }
        assert_eq!(list_by_organization(db.pool(), &org, 2).await.expect("list").len(), 2);
        assert_eq!(list_by_organization(db.pool(), &org, 10).await.expect("list").len(), 3);
    }
}
