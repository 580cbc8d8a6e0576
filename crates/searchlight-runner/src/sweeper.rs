//! Stale-audit sweeper.
//!
//! Audits whose worker died stay in an in-progress status forever unless
//! something notices. A sweep does two things:
//!
//! 1. fails in-progress audits idle past the staleness threshold, and
//! 2. re-arms claimable audits idle past the continuation grace, whose
//!    continuation call was presumably lost.
//!
//! Failing is a compare-and-set on the `updated_at` value the sweep observed,
//! so a heartbeat landing in between keeps the audit alive.
//!
//! [`SweepLoop`] also purges expired sessions on every tick.

use crate::error::{Result, RunnerError};
use crate::settings::SweepPolicy;
use crate::trigger::ContinuationTrigger;
use chrono::{DateTime, Utc};
use searchlight_core::{time, AuditId, OrganizationId};
use searchlight_db::{audits, sessions, Database};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Audits failed as stale
    pub failed: Vec<AuditId>,
    /// Audits whose continuation was re-armed
    pub rearmed: Vec<AuditId>,
}

impl SweepReport {
    /// Nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty() && self.rearmed.is_empty()
    }
}

/// Sweep every tenant.
pub async fn sweep(
    db: &Database,
    policy: &SweepPolicy,
    trigger: &dyn ContinuationTrigger,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    sweep_scoped(db, policy, trigger, now, None).await
}

/// Sweep one tenant's audits.
pub async fn sweep_organization(
    db: &Database,
    organization_id: &OrganizationId,
    policy: &SweepPolicy,
    trigger: &dyn ContinuationTrigger,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    sweep_scoped(db, policy, trigger, now, Some(organization_id)).await
}

async fn sweep_scoped(
    db: &Database,
    policy: &SweepPolicy,
    trigger: &dyn ContinuationTrigger,
    now: DateTime<Utc>,
    organization_id: Option<&OrganizationId>,
) -> Result<SweepReport> {
    let pool = db.pool();
    let now_text = time::format(now);
    let mut report = SweepReport::default();

    let stale_cutoff = time::format(now - to_chrono(policy.stale_after)?);
    let message = policy.timeout_message();
    for audit in audits::find_stale(pool, &stale_cutoff, organization_id).await? {
        if audits::fail_if_stale(pool, &audit.id, &audit.updated_at, &message, &now_text).await? {
            warn!(
                audit_id = %audit.id,
                organization_id = %audit.organization_id,
                status = %audit.status,
                last_update = %audit.updated_at,
                "Stale audit failed"
            );
            report.failed.push(audit.id);
        } else {
            debug!(audit_id = %audit.id, "Audit moved since observed, not failing");
        }
    }

    let grace_cutoff = time::format(now - to_chrono(policy.continuation_grace)?);
    for audit in audits::find_resumable(pool, &grace_cutoff, organization_id).await? {
        match trigger.schedule(&audit.id).await {
            Ok(()) => {
                info!(audit_id = %audit.id, status = %audit.status, "Continuation re-armed");
                report.rearmed.push(audit.id);
            }
            Err(e) => warn!(audit_id = %audit.id, error = %e, "Failed to re-arm continuation"),
        }
    }

    Ok(report)
}

fn to_chrono(d: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(d).map_err(|e| RunnerError::Internal(format!("duration out of range: {e}")))
}

/// Background task running [`sweep`] and the session purge on an interval.
pub struct SweepLoop {
    db: Arc<Database>,
    policy: SweepPolicy,
    trigger: Arc<dyn ContinuationTrigger>,
    interval: Duration,
}

impl SweepLoop {
    /// Create a loop; nothing runs until [`SweepLoop::spawn`].
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        policy: SweepPolicy,
        trigger: Arc<dyn ContinuationTrigger>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            policy,
            trigger,
            interval: interval.max(Duration::from_millis(10)),
        }
    }

    /// Run until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "Sweep loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match sweep(&self.db, &self.policy, self.trigger.as_ref(), Utc::now()).await {
                        Ok(report) if !report.is_empty() => info!(
                            failed = report.failed.len(),
                            rearmed = report.rearmed.len(),
                            "Sweep finished"
                        ),
                        Ok(_) => debug!("Sweep found nothing to do"),
                        Err(e) => warn!(error = %e, "Sweep failed"),
                    }
                    if let Err(e) = sessions::purge_expired(self.db.pool(), &time::now()).await {
                        warn!(error = %e, "Session purge failed");
                    }
                }
            }
        }

        info!("Sweep loop stopped");
    }
}
