//! Access token refresh policy for platform connections.

use chrono::{DateTime, Utc};
use searchlight_core::time;
use searchlight_db::metrics::{ConnectionStatus, PlatformConnection};
use serde::Serialize;
use std::time::Duration;

/// Refresh this long before a token actually expires.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(5 * 60);

/// Whether a token expiring at `expires_at` should be refreshed at `now`.
///
/// Tokens without an expiry never need refreshing. An unparseable expiry is
/// treated as expired.
#[must_use]
pub fn needs_refresh(expires_at: Option<&str>, now: DateTime<Utc>, skew: Duration) -> bool {
    let Some(raw) = expires_at else {
        return false;
    };
    let Some(expires) = time::parse(raw) else {
        tracing::warn!(expires_at = raw, "Unparseable token expiry, forcing refresh");
        return true;
    };
    match chrono::Duration::from_std(skew) {
        Ok(skew) => expires - skew <= now,
        Err(_) => true,
    }
}

/// What a connection needs before its next sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// Token usable as is
    Healthy,
    /// Token close to expiry; a refresh token is on file
    RefreshDue,
    /// The user has to reconnect
    NeedsReauth,
    /// Removed by the user
    Disconnected,
}

/// Classify a stored connection.
#[must_use]
pub fn connection_health(
    connection: &PlatformConnection,
    now: DateTime<Utc>,
    skew: Duration,
) -> ConnectionHealth {
    match connection.status {
        ConnectionStatus::Disconnected => ConnectionHealth::Disconnected,
        ConnectionStatus::NeedsReauth => ConnectionHealth::NeedsReauth,
        ConnectionStatus::Active => {
            if !needs_refresh(connection.token_expires_at.as_deref(), now, skew) {
                ConnectionHealth::Healthy
            } else if connection.has_refresh_token {
                ConnectionHealth::RefreshDue
            } else {
                ConnectionHealth::NeedsReauth
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use searchlight_core::OrganizationId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid")
    }

    fn connection(expires_at: Option<&str>, has_refresh_token: bool) -> PlatformConnection {
        PlatformConnection {
            id: "c1".to_string(),
            organization_id: OrganizationId::generate(),
            platform: "linkedin".to_string(),
            account_id: "urn:li:sponsoredAccount:1".to_string(),
            token_expires_at: expires_at.map(str::to_string),
            has_refresh_token,
            status: ConnectionStatus::Active,
            updated_at: time::format(now()),
        }
    }

    #[test]
    fn test_needs_refresh_inside_skew() {
        assert!(!needs_refresh(Some("2026-03-01T13:00:00.000Z"), now(), DEFAULT_REFRESH_SKEW));
        assert!(needs_refresh(Some("2026-03-01T12:04:00.000Z"), now(), DEFAULT_REFRESH_SKEW));
        assert!(needs_refresh(Some("2026-03-01T11:00:00.000Z"), now(), Duration::ZERO));
    }

    #[test]
    fn test_missing_and_garbage_expiry() {
        assert!(!needs_refresh(None, now(), DEFAULT_REFRESH_SKEW));
        assert!(needs_refresh(Some("soon"), now(), DEFAULT_REFRESH_SKEW));
    }

    #[test]
    fn test_connection_health() {
        let expiring = Some("2026-03-01T12:01:00.000Z");
        assert_eq!(
            connection_health(&connection(None, false), now(), DEFAULT_REFRESH_SKEW),
            ConnectionHealth::Healthy
        );
        assert_eq!(
            connection_health(&connection(expiring, true), now(), DEFAULT_REFRESH_SKEW),
            ConnectionHealth::RefreshDue
        );
        assert_eq!(
            connection_health(&connection(expiring, false), now(), DEFAULT_REFRESH_SKEW),
            ConnectionHealth::NeedsReauth
        );

        let mut gone = connection(None, true);
        gone.status = ConnectionStatus::Disconnected;
        assert_eq!(
            connection_health(&gone, now(), DEFAULT_REFRESH_SKEW),
            ConnectionHealth::Disconnected
        );
    }
}
