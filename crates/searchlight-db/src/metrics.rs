//! Platform connections and the campaign metrics time series.

use crate::error::{DatabaseError, Result};
use searchlight_core::{time, OrganizationId};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// State of a platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Credentials are usable
    Active,
    /// The user must reconnect
    NeedsReauth,
    /// Removed by the user
    Disconnected,
}

impl ConnectionStatus {
    /// Database representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NeedsReauth => "needs_reauth",
            Self::Disconnected => "disconnected",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "needs_reauth" => Ok(Self::NeedsReauth),
            "disconnected" => Ok(Self::Disconnected),
            other => Err(DatabaseError::Decode(format!(
                "unknown connection status '{other}'"
            ))),
        }
    }
}

/// An organization's link to a marketing platform account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformConnection {
    /// Row ID
    pub id: String,
    /// Owning tenant
    pub organization_id: OrganizationId,
    /// Platform name (`linkedin`, `google_analytics`, `hubspot`)
    pub platform: String,
    /// Account or property ID on the platform
    pub account_id: String,
    /// Access token expiry
    pub token_expires_at: Option<String>,
    /// Whether a refresh token is on file
    pub has_refresh_token: bool,
    /// Connection state
    pub status: ConnectionStatus,
    /// Last change
    pub updated_at: String,
}

/// One value of one metric on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRow {
    /// Platform name
    pub platform: String,
    /// Metric name
    pub metric: String,
    /// Day (`YYYY-MM-DD`)
    pub date: String,
    /// Value
    pub value: f64,
}

/// Sum of a metric over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricTotal {
    /// Platform name
    pub platform: String,
    /// Metric name
    pub metric: String,
    /// Sum of daily values
    pub total: f64,
}

/// Create or replace the connection for `(organization, platform)`.
pub async fn upsert_connection(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    platform: &str,
    account_id: &str,
    token_expires_at: Option<&str>,
    has_refresh_token: bool,
    status: ConnectionStatus,
) -> Result<PlatformConnection> {
    let now = time::now();
    sqlx::query(
        "INSERT INTO platform_connections
             (id, organization_id, platform, account_id, token_expires_at, has_refresh_token, status, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (organization_id, platform) DO UPDATE SET
             account_id = excluded.account_id,
             token_expires_at = excluded.token_expires_at,
             has_refresh_token = excluded.has_refresh_token,
             status = excluded.status,
             updated_at = excluded.updated_at",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(organization_id.as_str())
    .bind(platform)
    .bind(account_id)
    .bind(token_expires_at)
    .bind(has_refresh_token)
    .bind(status.as_str())
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(organization_id = %organization_id, platform, status = status.as_str(), "Platform connection saved");

    let row = sqlx::query(
        "SELECT * FROM platform_connections WHERE organization_id = ? AND platform = ?",
    )
    .bind(organization_id.as_str())
    .bind(platform)
    .fetch_one(pool)
    .await?;
    parse_connection(&row)
}

/// All connections of an organization.
pub async fn list_connections(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
) -> Result<Vec<PlatformConnection>> {
    let rows = sqlx::query(
        "SELECT * FROM platform_connections WHERE organization_id = ? ORDER BY platform ASC",
    )
    .bind(organization_id.as_str())
    .fetch_all(pool)
    .await?;
    rows.iter().map(parse_connection).collect()
}

/// Write metric points, replacing existing values for the same day.
///
/// All points land in one transaction.
pub async fn upsert_points(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    points: &[MetricRow],
) -> Result<u64> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    for point in points {
        sqlx::query(
            "INSERT INTO campaign_metrics (organization_id, platform, metric, date, value, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (organization_id, platform, metric, date) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(organization_id.as_str())
        .bind(&point.platform)
        .bind(&point.metric)
        .bind(&point.date)
        .bind(point.value)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!(organization_id = %organization_id, points = points.len(), "Metric points stored");
    Ok(points.len() as u64)
}

/// Daily values of one metric between `from` and `to` inclusive.
pub async fn series(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    platform: Option<&str>,
    metric: &str,
    from: &str,
    to: &str,
) -> Result<Vec<MetricRow>> {
    let rows = sqlx::query(
        "SELECT platform, metric, date, value FROM campaign_metrics
         WHERE organization_id = ? AND (? IS NULL OR platform = ?) AND metric = ?
           AND date >= ? AND date <= ?
         ORDER BY date ASC, platform ASC",
    )
    .bind(organization_id.as_str())
    .bind(platform)
    .bind(platform)
    .bind(metric)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(MetricRow {
                platform: r.try_get("platform")?,
                metric: r.try_get("metric")?,
                date: r.try_get("date")?,
                value: r.try_get("value")?,
            })
        })
        .collect()
}

/// Totals per platform and metric between `from` and `to` inclusive.
pub async fn totals(
    pool: &Pool<Sqlite>,
    organization_id: &OrganizationId,
    from: &str,
    to: &str,
) -> Result<Vec<MetricTotal>> {
    let rows = sqlx::query(
        "SELECT platform, metric, SUM(value) AS total FROM campaign_metrics
         WHERE organization_id = ? AND date >= ? AND date <= ?
         GROUP BY platform, metric ORDER BY platform ASC, metric ASC",
    )
    .bind(organization_id.as_str())
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(MetricTotal {
                platform: r.try_get("platform")?,
                metric: r.try_get("metric")?,
                total: r.try_get("total")?,
            })
        })
        .collect()
}

fn parse_connection(row: &sqlx::sqlite::SqliteRow) -> Result<PlatformConnection> {
    Ok(PlatformConnection {
        id: row.try_get("id")?,
        organization_id: OrganizationId::new(row.try_get::<String, _>("organization_id")?)?,
        platform: row.try_get("platform")?,
        account_id: row.try_get("account_id")?,
        token_expires_at: row.try_get("token_expires_at")?,
        has_refresh_token: row.try_get("has_refresh_token")?,
        status: ConnectionStatus::parse(&row.try_get::<String, _>("status")?)?,
        updated_at: row.try_get("updated_at")?,
    })
}
