//! Campaign metric ingestion, totals, daily series and platform connections.

use super::org_id;
use crate::error::{ApiError, ApiResult};
use crate::{AppState, AuthUser};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use searchlight_db::metrics::{self, ConnectionStatus, MetricRow, MetricTotal, PlatformConnection};
use searchlight_metrics::{
    connection_health, normalize, summarize_totals, ConnectionHealth, MetricSummary, Platform,
    DEFAULT_REFRESH_SKEW,
};
use searchlight_permissions::Permission;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Days covered when the totals query names no range.
const DEFAULT_RANGE_DAYS: i64 = 30;

/// Ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Platform the payload came from
    pub platform: Platform,
    /// Points written
    pub stored: u64,
    /// Values dropped as unparseable
    pub skipped: usize,
}

/// Totals query
#[derive(Debug, Deserialize)]
pub struct TotalsQuery {
    /// First day, inclusive (`YYYY-MM-DD`)
    pub from: Option<NaiveDate>,
    /// Last day, inclusive
    pub to: Option<NaiveDate>,
}

/// Totals response
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    /// First day covered
    pub from: NaiveDate,
    /// Last day covered
    pub to: NaiveDate,
    /// Sum per platform and metric
    pub totals: Vec<MetricTotal>,
    /// Per-platform totals with derived ratios
    pub platforms: BTreeMap<String, MetricSummary>,
}

/// Series query
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// Metric name, e.g. `clicks`
    pub metric: String,
    /// Restrict to one platform
    pub platform: Option<String>,
    /// First day, inclusive
    pub from: Option<NaiveDate>,
    /// Last day, inclusive
    pub to: Option<NaiveDate>,
}

/// Series response
#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    /// First day covered
    pub from: NaiveDate,
    /// Last day covered
    pub to: NaiveDate,
    /// Daily values, oldest first
    pub points: Vec<MetricRow>,
}

/// A connection with its refresh state.
#[derive(Debug, Serialize)]
pub struct ConnectionView {
    /// Stored connection
    #[serde(flatten)]
    pub connection: PlatformConnection,
    /// What it needs before the next sync
    pub health: ConnectionHealth,
}

/// PUT connection request
#[derive(Debug, Deserialize)]
pub struct UpsertConnectionRequest {
    /// Account or property on the platform
    pub account_id: String,
    /// Access token expiry (RFC 3339)
    pub token_expires_at: Option<String>,
    /// Whether a refresh token is on file
    #[serde(default)]
    pub has_refresh_token: bool,
    /// Connection state; active when absent
    pub status: Option<ConnectionStatus>,
}

/// POST /api/organizations/:org/metrics/:platform
pub async fn ingest(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org, platform)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<IngestResponse>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageIntegrations)?;
    let platform = Platform::parse(&platform)?;

    let normalized = normalize(platform, &payload)?;
    let stored = metrics::upsert_points(state.db.pool(), &org, &normalized.rows()).await?;

    tracing::info!(
        organization_id = %org,
        %platform,
        stored,
        skipped = normalized.skipped,
        "Metrics ingested"
    );
    Ok(Json(IngestResponse {
        platform,
        stored,
        skipped: normalized.skipped,
    }))
}

/// GET /api/organizations/:org/metrics
pub async fn totals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
    Query(query): Query<TotalsQuery>,
) -> ApiResult<Json<TotalsResponse>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewMetrics)?;

    let (from, to) = date_range(query.from, query.to)?;
    let totals = metrics::totals(
        state.db.pool(),
        &org,
        &from.format("%Y-%m-%d").to_string(),
        &to.format("%Y-%m-%d").to_string(),
    )
    .await?;
    Ok(Json(TotalsResponse {
        from,
        to,
        platforms: summarize_totals(&totals),
        totals,
    }))
}

/// GET /api/organizations/:org/metrics/series
pub async fn series(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewMetrics)?;

    let metric = query.metric.trim();
    if metric.is_empty() {
        return Err(ApiError::BadRequest("metric must not be empty".to_string()));
    }
    let platform = query.platform.as_deref().map(Platform::parse).transpose()?;
    let (from, to) = date_range(query.from, query.to)?;

    let points = metrics::series(
        state.db.pool(),
        &org,
        platform.as_ref().map(Platform::as_str),
        metric,
        &from.format("%Y-%m-%d").to_string(),
        &to.format("%Y-%m-%d").to_string(),
    )
    .await?;
    Ok(Json(SeriesResponse { from, to, points }))
}

/// Range named by a query, defaulting to the last [`DEFAULT_RANGE_DAYS`] days.
fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> ApiResult<(NaiveDate, NaiveDate)> {
    let to = to.unwrap_or_else(|| Utc::now().date_naive());
    let from = from.unwrap_or_else(|| to - chrono::Duration::days(DEFAULT_RANGE_DAYS - 1));
    if from > to {
        return Err(ApiError::BadRequest("'from' is after 'to'".to_string()));
    }
    Ok((from, to))
}

/// GET /api/organizations/:org/connections
pub async fn list_connections(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
) -> ApiResult<Json<Vec<ConnectionView>>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewMetrics)?;

    let now = Utc::now();
    let views = metrics::list_connections(state.db.pool(), &org)
        .await?
        .into_iter()
        .map(|connection| ConnectionView {
            health: connection_health(&connection, now, DEFAULT_REFRESH_SKEW),
            connection,
        })
        .collect();
    Ok(Json(views))
}

/// PUT /api/organizations/:org/connections/:platform
pub async fn upsert_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org, platform)): Path<(String, String)>,
    Json(request): Json<UpsertConnectionRequest>,
) -> ApiResult<Json<ConnectionView>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageIntegrations)?;
    let platform = Platform::parse(&platform)?;

    if request.account_id.trim().is_empty() {
        return Err(ApiError::BadRequest("account_id must not be empty".to_string()));
    }
    let expires_at = match request.token_expires_at.as_deref() {
        Some(raw) => Some(
            searchlight_core::time::parse(raw)
                .map(searchlight_core::time::format)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid token_expires_at '{raw}'")))?,
        ),
        None => None,
    };

    let connection = metrics::upsert_connection(
        state.db.pool(),
        &org,
        platform.as_str(),
        request.account_id.trim(),
        expires_at.as_deref(),
        request.has_refresh_token,
        request.status.unwrap_or(ConnectionStatus::Active),
    )
    .await?;

    Ok(Json(ConnectionView {
        health: connection_health(&connection, Utc::now(), DEFAULT_REFRESH_SKEW),
        connection,
    }))
}

/// Build metrics routes
pub fn metrics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/organizations/:org/metrics", get(totals))
        .route("/api/organizations/:org/metrics/series", get(series))
        .route("/api/organizations/:org/metrics/:platform", post(ingest))
        .route("/api/organizations/:org/connections", get(list_connections))
        .route(
            "/api/organizations/:org/connections/:platform",
            put(upsert_connection),
        )
}
