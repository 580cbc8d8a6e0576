//! Pages discovered and crawled for an audit.
//!
//! Queued rows form the crawl frontier, served in depth order and then in the
//! order they were discovered. `(audit_id, url)` is unique, so re-discovering a
//! link is a no-op.

use crate::error::{DatabaseError, Result};
use searchlight_core::{time, AuditId};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Crawl state of a page row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Waiting in the frontier
    Queued,
    /// Fetched and analyzed
    Crawled,
    /// Fetch or analysis failed
    Failed,
}

impl PageStatus {
    /// Database representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Crawled => "crawled",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "crawled" => Ok(Self::Crawled),
            "failed" => Ok(Self::Failed),
            other => Err(DatabaseError::Decode(format!("unknown page status '{other}'"))),
        }
    }
}

/// A frontier entry handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPage {
    /// Row ID
    pub id: i64,
    /// Normalized URL
    pub url: String,
    /// Link distance from the target URL
    pub depth: i64,
}

/// Analysis results written when a page has been crawled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawledPage {
    /// HTTP status code
    pub http_status: i64,
    /// Response time in milliseconds
    pub response_ms: i64,
    /// Body size in bytes
    pub bytes: i64,
    /// `<title>` text
    pub title: Option<String>,
    /// Meta description
    pub meta_description: Option<String>,
    /// Number of `<h1>` elements
    pub h1_count: i64,
    /// Visible word count
    pub word_count: i64,
    /// Number of images
    pub image_count: i64,
    /// Images without an `alt` attribute
    pub images_missing_alt: i64,
    /// Links to the same host
    pub internal_links: i64,
    /// Links to other hosts
    pub external_links: i64,
    /// JSON-LD present
    pub has_structured_data: bool,
    /// Page SEO score
    pub seo_score: i64,
    /// Page performance score
    pub performance_score: i64,
    /// Issue list as JSON
    pub issues: serde_json::Value,
}

/// A full page row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditPage {
    /// Row ID
    pub id: i64,
    /// Owning audit
    pub audit_id: AuditId,
    /// Normalized URL
    pub url: String,
    /// Link distance from the target URL
    pub depth: i64,
    /// Crawl state
    pub status: PageStatus,
    /// HTTP status code
    pub http_status: Option<i64>,
    /// Response time in milliseconds
    pub response_ms: Option<i64>,
    /// Body size in bytes
    pub bytes: Option<i64>,
    /// `<title>` text
    pub title: Option<String>,
    /// Meta description
    pub meta_description: Option<String>,
    /// Number of `<h1>` elements
    pub h1_count: Option<i64>,
    /// Visible word count
    pub word_count: Option<i64>,
    /// Number of images
    pub image_count: Option<i64>,
    /// Images without an `alt` attribute
    pub images_missing_alt: Option<i64>,
    /// Links to the same host
    pub internal_links: Option<i64>,
    /// Links to other hosts
    pub external_links: Option<i64>,
    /// JSON-LD present
    pub has_structured_data: Option<bool>,
    /// Page SEO score
    pub seo_score: Option<i64>,
    /// Page performance score
    pub performance_score: Option<i64>,
    /// Issue list
    pub issues: Option<serde_json::Value>,
    /// GEO score
    pub geo_score: Option<i64>,
    /// GEO sub-scores and recommendations
    pub geo_details: Option<serde_json::Value>,
    /// Failure reason
    pub error_message: Option<String>,
    /// When the URL entered the frontier
    pub discovered_at: String,
    /// When it was crawled
    pub crawled_at: Option<String>,
}

/// Page counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageCounts {
    /// Still in the frontier
    pub queued: i64,
    /// Crawled successfully
    pub crawled: i64,
    /// Failed
    pub failed: i64,
}

impl PageCounts {
    /// Every page row of the audit.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.queued + self.crawled + self.failed
    }
}

/// Add URLs to an audit's frontier at the given depth.
///
/// Already-known URLs are ignored and the audit never holds more than
/// `max_pages` page rows. Returns the number of rows inserted.
pub async fn enqueue(
    pool: &Pool<Sqlite>,
    audit_id: &AuditId,
    urls: &[String],
    depth: i64,
    max_pages: i64,
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_pages WHERE audit_id = ?")
        .bind(audit_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
    let mut room = max_pages - existing;
    let now = time::now();
    let mut inserted = 0;

    for url in urls {
        if room <= 0 {
            break;
        }
        let result = sqlx::query(
            "INSERT OR IGNORE INTO audit_pages (audit_id, url, depth, status, discovered_at)
             VALUES (?, ?, ?, 'queued', ?)",
        )
        .bind(audit_id.as_str())
        .bind(url)
        .bind(depth)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            inserted += 1;
            room -= 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Take up to `limit` frontier entries, shallowest first.
pub async fn next_batch(pool: &Pool<Sqlite>, audit_id: &AuditId, limit: i64) -> Result<Vec<QueuedPage>> {
    let rows = sqlx::query(
        "SELECT id, url, depth FROM audit_pages WHERE audit_id = ? AND status = 'queued'
         ORDER BY depth ASC, id ASC LIMIT ?",
    )
    .bind(audit_id.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(QueuedPage {
                id: r.try_get("id")?,
                url: r.try_get("url")?,
                depth: r.try_get("depth")?,
            })
        })
        .collect()
}

/// Store the analysis of a crawled page.
pub async fn record_crawled(pool: &Pool<Sqlite>, page_id: i64, page: &CrawledPage) -> Result<()> {
    let result = sqlx::query(
        "UPDATE audit_pages SET status = 'crawled', http_status = ?, response_ms = ?, bytes = ?,
         title = ?, meta_description = ?, h1_count = ?, word_count = ?, image_count = ?,
         images_missing_alt = ?, internal_links = ?, external_links = ?, has_structured_data = ?,
         seo_score = ?, performance_score = ?, issues = ?, error_message = NULL, crawled_at = ?
         WHERE id = ?",
    )
    .bind(page.http_status)
    .bind(page.response_ms)
    .bind(page.bytes)
    .bind(&page.title)
    .bind(&page.meta_description)
    .bind(page.h1_count)
    .bind(page.word_count)
    .bind(page.image_count)
    .bind(page.images_missing_alt)
    .bind(page.internal_links)
    .bind(page.external_links)
    .bind(page.has_structured_data)
    .bind(page.seo_score)
    .bind(page.performance_score)
    .bind(serde_json::to_string(&page.issues)?)
    .bind(time::now())
    .bind(page_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Audit page {page_id} not found"
        )));
    }
    Ok(())
}

/// Mark a page as failed.
pub async fn record_failed(pool: &Pool<Sqlite>, page_id: i64, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE audit_pages SET status = 'failed', error_message = ?, crawled_at = ? WHERE id = ?",
    )
    .bind(message)
    .bind(time::now())
    .bind(page_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store the GEO assessment of a page.
pub async fn record_geo(
    pool: &Pool<Sqlite>,
    page_id: i64,
    geo_score: Option<i64>,
    details: &serde_json::Value,
) -> Result<()> {
    sqlx::query("UPDATE audit_pages SET geo_score = ?, geo_details = ? WHERE id = ?")
        .bind(geo_score)
        .bind(serde_json::to_string(details)?)
        .bind(page_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Count an audit's pages by status.
pub async fn count_by_status(pool: &Pool<Sqlite>, audit_id: &AuditId) -> Result<PageCounts> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM audit_pages WHERE audit_id = ? GROUP BY status")
        .bind(audit_id.as_str())
        .fetch_all(pool)
        .await?;

    let mut counts = PageCounts::default();
    for row in rows {
        let n: i64 = row.try_get("n")?;
        match PageStatus::parse(&row.try_get::<String, _>("status")?)? {
            PageStatus::Queued => counts.queued = n,
            PageStatus::Crawled => counts.crawled = n,
            PageStatus::Failed => counts.failed = n,
        }
    }
    Ok(counts)
}

/// Pages of an audit in discovery order, optionally filtered by status.
pub async fn list_for_audit(
    pool: &Pool<Sqlite>,
    audit_id: &AuditId,
    status: Option<PageStatus>,
) -> Result<Vec<AuditPage>> {
    let rows = sqlx::query(
        "SELECT * FROM audit_pages WHERE audit_id = ? AND (? IS NULL OR status = ?) ORDER BY id ASC",
    )
    .bind(audit_id.as_str())
    .bind(status.map(|s| s.as_str()))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;
    rows.iter().map(parse_row).collect()
}

fn parse_json(raw: Option<String>) -> Result<Option<serde_json::Value>> {
    Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditPage> {
    Ok(AuditPage {
        id: row.try_get("id")?,
        audit_id: AuditId::new(row.try_get::<String, _>("audit_id")?)?,
        url: row.try_get("url")?,
        depth: row.try_get("depth")?,
        status: PageStatus::parse(&row.try_get::<String, _>("status")?)?,
        http_status: row.try_get("http_status")?,
        response_ms: row.try_get("response_ms")?,
        bytes: row.try_get("bytes")?,
        title: row.try_get("title")?,
        meta_description: row.try_get("meta_description")?,
        h1_count: row.try_get("h1_count")?,
        word_count: row.try_get("word_count")?,
        image_count: row.try_get("image_count")?,
        images_missing_alt: row.try_get("images_missing_alt")?,
        internal_links: row.try_get("internal_links")?,
        external_links: row.try_get("external_links")?,
        has_structured_data: row.try_get("has_structured_data")?,
        seo_score: row.try_get("seo_score")?,
        performance_score: row.try_get("performance_score")?,
        issues: parse_json(row.try_get("issues")?)?,
        geo_score: row.try_get("geo_score")?,
        geo_details: parse_json(row.try_get("geo_details")?)?,
        error_message: row.try_get("error_message")?,
        discovered_at: row.try_get("discovered_at")?,
        crawled_at: row.try_get("crawled_at")?,
    })
}
