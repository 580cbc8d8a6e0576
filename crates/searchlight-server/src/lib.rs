//! Searchlight Server - HTTP API over the audit, team and metrics layers.
//!
//! The router is built from an [`AppState`] holding the database, the batch
//! runner and the authorizer. Handlers authenticate with the [`AuthUser`]
//! extractor and check permissions against the organization in the path.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod auth;
pub mod error;
pub mod telemetry;

// Re-export commonly used types
pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use searchlight_core::AppConfig;
use searchlight_db::Database;
use searchlight_permissions::Authorizer;
use searchlight_runner::{BatchRunner, SweepPolicy};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Upper bound accepted for an audit's page limit.
pub const MAX_PAGES_LIMIT: i64 = 500;

/// Request-independent settings handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Lifetime of new sessions
    pub session_ttl: chrono::Duration,
    /// Lifetime of new invites
    pub invite_ttl: chrono::Duration,
    /// Page limit for audits that do not name one
    pub default_max_pages: i64,
    /// Secret expected on continuation calls; `None` disables the endpoint
    pub continuation_secret: Option<String>,
    /// Thresholds used when sweeping before answering active-audit polls
    pub sweep: SweepPolicy,
}

impl ApiSettings {
    /// Derive settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session_ttl: chrono::Duration::hours(config.auth.session_ttl_hours),
            invite_ttl: chrono::Duration::days(config.auth.invite_ttl_days),
            default_max_pages: i64::from(config.crawler.default_max_pages).clamp(1, MAX_PAGES_LIMIT),
            continuation_secret: config.server.continuation_secret.clone(),
            sweep: SweepPolicy::from_config(&config.runner),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle
    pub db: Arc<Database>,
    /// Audit batch runner
    pub runner: Arc<BatchRunner>,
    /// Permission checks
    pub authorizer: Authorizer,
    /// Handler settings
    pub settings: Arc<ApiSettings>,
    /// Service start, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create state for a database and runner.
    #[must_use]
    pub fn new(db: Arc<Database>, runner: Arc<BatchRunner>, settings: ApiSettings) -> Self {
        Self {
            db,
            runner,
            authorizer: Authorizer::new(),
            settings: Arc::new(settings),
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::account_routes())
        .merge(api::team_routes())
        .merge(api::audit_routes())
        .merge(api::metrics_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
