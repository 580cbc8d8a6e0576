//! Bounded in-memory record of authorization decisions.

use crate::Permission;
use chrono::{DateTime, Utc};
use searchlight_core::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 1024;

/// How a decision came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Permission granted
    Allowed,
    /// Role lacks the permission
    Denied,
    /// Target organization differs from the caller's
    CrossTenant,
}

/// One authorization decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEntry {
    /// Entry identifier
    pub id: Uuid,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Acting user
    pub user_id: UserId,
    /// Organization the resource belongs to
    pub target_organization: OrganizationId,
    /// Permission checked
    pub permission: Permission,
    /// Result
    pub outcome: AccessOutcome,
}

/// Ring buffer of recent decisions. The oldest entry is dropped when full.
#[derive(Debug)]
pub struct AccessLog {
    entries: VecDeque<AccessEntry>,
    capacity: usize,
}

impl AccessLog {
    /// Create a log that keeps at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Append a decision.
    pub fn record(
        &mut self,
        user_id: &UserId,
        target_organization: &OrganizationId,
        permission: Permission,
        outcome: AccessOutcome,
    ) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(AccessEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: user_id.clone(),
            target_organization: target_organization.clone(),
            permission,
            outcome,
        });
    }

    /// The last `count` entries, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<AccessEntry> {
        let start = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Number of denied or cross-tenant decisions currently held.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome != AccessOutcome::Allowed)
            .count()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
