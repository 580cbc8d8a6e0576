//! The audit batch runner.
//!
//! One call to [`BatchRunner::run_batch`] is one bounded slice of an audit:
//!
//! ```text
//! claim (CAS) → seed frontier → fetch ≤ batch_size pages within the window
//!     → persist + enqueue links + heartbeat per page → GEO scoring
//!     → complete  |  release + schedule continuation
//! ```
//!
//! Fetching and GEO scoring both stop at `time_budget - safety_margin` after
//! the batch started; the margin is left for the release and the
//! continuation call. Fetches still running at that point are dropped and
//! their pages stay queued for the next batch.
//!
//! Every write after the claim is conditional on the claim token, so a
//! worker that was cancelled or timed out by the sweeper stops at its next
//! heartbeat instead of overwriting the audit.

use crate::error::{Result, RunnerError};
use crate::settings::RunnerSettings;
use crate::trigger::{ContinuationTrigger, InProcessContinuation};
use futures::stream::{FuturesUnordered, StreamExt};
use searchlight_core::{time, AuditId, AuditKind};
use searchlight_crawler::{
    analyze, fetch_with_retry, performance, seo, AuditSummary, CrawlError, FetchedPage, Issue,
    PageFetcher, Scope, SummaryBuilder,
};
use searchlight_db::audit_pages::{self, CrawledPage, PageStatus, QueuedPage};
use searchlight_db::audits::{self, Audit};
use searchlight_db::Database;
use searchlight_geo::{aggregate, GeoAnalyzer, GeoPageInput, GeoSummary, PageGeoScore};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Failure recorded on pages whose fetch was still running at the deadline of
/// a batch that finished nothing else.
pub const FETCH_CUT_OFF: &str = "Fetch did not finish within the batch time budget";

/// How a batch call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The audit was not claimable: another worker holds it or it is terminal
    NotClaimed,
    /// Work remains; the batch was released and a continuation scheduled
    Continued {
        /// Pages crawled so far
        pages_crawled: i64,
        /// Pages still queued
        queued: i64,
    },
    /// The audit finished
    Completed {
        /// Pages crawled in total
        pages_crawled: i64,
        /// Overall score written to the audit
        overall_score: Option<i64>,
    },
    /// The claim was taken away mid-batch (cancelled or timed out)
    ClaimLost,
    /// The batch hit an error and the audit was failed
    Failed {
        /// Message written to the audit
        message: String,
    },
}

/// Summary document stored on a completed audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Crawl and SEO/performance roll-up
    #[serde(flatten)]
    pub crawl: AuditSummary,
    /// GEO roll-up for GEO audits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoSummary>,
}

/// Runs audit batches.
pub struct BatchRunner {
    db: Arc<Database>,
    fetcher: Arc<dyn PageFetcher>,
    geo: GeoAnalyzer,
    trigger: Arc<dyn ContinuationTrigger>,
    settings: RunnerSettings,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("geo", &self.geo)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Create a runner.
    ///
    /// GEO audits are scored from on-page signals when `geo` is `None`.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        fetcher: Arc<dyn PageFetcher>,
        geo: Option<GeoAnalyzer>,
        trigger: Arc<dyn ContinuationTrigger>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            db,
            fetcher,
            geo: geo.unwrap_or_else(GeoAnalyzer::heuristic_only),
            trigger,
            settings,
        }
    }

    /// Create a runner whose continuations run on this process's runtime.
    #[must_use]
    pub fn in_process(
        db: Arc<Database>,
        fetcher: Arc<dyn PageFetcher>,
        geo: Option<GeoAnalyzer>,
        settings: RunnerSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|runner| {
            let trigger = Arc::new(InProcessContinuation::new(runner.clone()));
            Self::new(db, fetcher, geo, trigger, settings)
        })
    }

    /// Trigger used to arm continuations.
    #[must_use]
    pub fn trigger(&self) -> &Arc<dyn ContinuationTrigger> {
        &self.trigger
    }

    /// Runner settings.
    #[must_use]
    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run one batch of an audit.
    ///
    /// # Errors
    /// Returns an error only when the database fails before the claim or
    /// while failing the audit; batch errors under a claim become
    /// [`BatchOutcome::Failed`].
    pub async fn run_batch(&self, audit_id: &AuditId) -> Result<BatchOutcome> {
        let started = Instant::now();
        let pool = self.db.pool();

        let Some(token) = audits::claim(pool, audit_id, &time::now()).await? else {
            debug!(audit_id = %audit_id, "Audit not claimable, skipping batch");
            return Ok(BatchOutcome::NotClaimed);
        };

        let result = match audits::get(pool, audit_id).await {
            Ok(Some(audit)) => self.run_claimed(&audit, &token, started).await,
            Ok(None) => Err(RunnerError::AuditNotFound(audit_id.to_string())),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(outcome) => {
                if outcome == BatchOutcome::ClaimLost {
                    info!(audit_id = %audit_id, "Claim lost mid-batch, stopping");
                }
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                error!(audit_id = %audit_id, error = %message, "Batch failed");
                if audits::fail_claimed(pool, audit_id, &token, &message, &time::now()).await? {
                    Ok(BatchOutcome::Failed { message })
                } else {
                    Ok(BatchOutcome::ClaimLost)
                }
            }
        }
    }

    async fn run_claimed(&self, audit: &Audit, token: &str, started: Instant) -> Result<BatchOutcome> {
        let pool = self.db.pool();
        let scope = Scope::new(&audit.target_url)?;

        if audit_pages::count_by_status(pool, &audit.id).await?.total() == 0 {
            audit_pages::enqueue(pool, &audit.id, &[scope.root().to_string()], 0, audit.max_pages)
                .await?;
            debug!(audit_id = %audit.id, root = %scope.root(), "Frontier seeded");
        }

        let batch = audit_pages::next_batch(pool, &audit.id, i64::from(self.settings.batch_size))
            .await?;
        let deadline = started + self.settings.fetch_window();
        info!(
            audit_id = %audit.id,
            batch = audit.batch_count,
            pages = batch.len(),
            "Starting batch"
        );

        let mut waiting = batch.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut pending: Vec<(i64, String)> = Vec::new();
        let mut recorded = 0usize;
        let mut geo_pages: Vec<(i64, GeoPageInput)> = Vec::new();

        loop {
            while in_flight.len() < self.settings.concurrency && Instant::now() < deadline {
                match waiting.next() {
                    Some(page) => {
                        pending.push((page.id, page.url.clone()));
                        in_flight.push(self.fetch_page(page));
                    }
                    None => break,
                }
            }

            let Ok(next) = timeout_at(deadline, in_flight.next()).await else {
                break;
            };
            let Some((page, fetched)) = next else {
                break;
            };
            pending.retain(|(id, _)| *id != page.id);

            if let Some(input) = self.record_page(audit, &scope, &page, fetched).await? {
                if audit.kind == AuditKind::Geo {
                    geo_pages.push((page.id, input));
                }
            }
            recorded += 1;

            if !audits::heartbeat(pool, &audit.id, token, &time::now()).await? {
                return Ok(BatchOutcome::ClaimLost);
            }
        }

        // Dropping the futures cancels fetches still running at the deadline.
        drop(in_flight);
        if !pending.is_empty() {
            if recorded == 0 {
                // a batch that finished nothing fails its stragglers so the frontier shrinks
                for (page_id, url) in &pending {
                    warn!(audit_id = %audit.id, url = %url, "Page fetch outlived the batch window");
                    audit_pages::record_failed(pool, *page_id, FETCH_CUT_OFF).await?;
                }
                if !audits::heartbeat(pool, &audit.id, token, &time::now()).await? {
                    return Ok(BatchOutcome::ClaimLost);
                }
            } else {
                info!(
                    audit_id = %audit.id,
                    abandoned = pending.len(),
                    "Batch deadline reached, pages stay queued"
                );
            }
        }

        let deferred = waiting.len();
        if deferred > 0 {
            info!(audit_id = %audit.id, deferred, "Fetch window closed, deferring pages");
        }

        if !geo_pages.is_empty() {
            self.score_geo(&geo_pages, deadline).await?;
            if !audits::heartbeat(pool, &audit.id, token, &time::now()).await? {
                return Ok(BatchOutcome::ClaimLost);
            }
        }

        let counts = audit_pages::count_by_status(pool, &audit.id).await?;
        if counts.queued == 0 || counts.crawled + counts.failed >= audit.max_pages {
            let (overall_score, report) = self.build_report(audit).await?;
            let summary = serde_json::to_value(&report)?;
            let won = audits::complete(
                pool,
                &audit.id,
                token,
                counts.crawled,
                overall_score,
                &summary,
                &time::now(),
            )
            .await?;
            return Ok(if won {
                BatchOutcome::Completed {
                    pages_crawled: counts.crawled,
                    overall_score,
                }
            } else {
                BatchOutcome::ClaimLost
            });
        }

        if !audits::release_batch(pool, &audit.id, token, counts.crawled, &time::now()).await? {
            return Ok(BatchOutcome::ClaimLost);
        }
        if let Err(e) = self.trigger.schedule(&audit.id).await {
            // the sweeper re-arms audits whose continuation never arrives
            warn!(audit_id = %audit.id, error = %e, "Failed to schedule continuation");
        }
        debug!(
            audit_id = %audit.id,
            crawled = counts.crawled,
            queued = counts.queued,
            "Batch released"
        );
        Ok(BatchOutcome::Continued {
            pages_crawled: counts.crawled,
            queued: counts.queued,
        })
    }

    async fn fetch_page(
        &self,
        page: QueuedPage,
    ) -> (QueuedPage, searchlight_crawler::Result<FetchedPage>) {
        let fetched = fetch_with_retry(self.fetcher.as_ref(), &page.url, &self.settings.retry).await;
        (page, fetched)
    }

    /// Persist one fetch result. Returns GEO input for analyzed HTML pages.
    async fn record_page(
        &self,
        audit: &Audit,
        scope: &Scope,
        page: &QueuedPage,
        fetched: std::result::Result<FetchedPage, CrawlError>,
    ) -> Result<Option<GeoPageInput>> {
        let pool = self.db.pool();

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(audit_id = %audit.id, url = %page.url, error = %e, "Page fetch failed");
                audit_pages::record_failed(pool, page.id, &e.to_string()).await?;
                return Ok(None);
            }
        };

        let perf = performance::evaluate(fetched.elapsed, fetched.body.len());
        let mut record = CrawledPage {
            http_status: i64::from(fetched.status),
            response_ms: i64::try_from(fetched.elapsed.as_millis()).unwrap_or(i64::MAX),
            bytes: count(fetched.body.len()),
            performance_score: i64::from(perf.score),
            ..CrawledPage::default()
        };

        if !fetched.is_success() {
            let report = seo::http_error(fetched.status);
            record.seo_score = i64::from(report.score);
            record.issues = issues_json(report.issues, perf.issues)?;
            audit_pages::record_crawled(pool, page.id, &record).await?;
            return Ok(None);
        }

        if !fetched.is_html() {
            let content_type = fetched.content_type.as_deref().unwrap_or("unknown");
            audit_pages::record_failed(
                pool,
                page.id,
                &format!("Unsupported content type: {content_type}"),
            )
            .await?;
            return Ok(None);
        }

        let Some(page_url) = Url::parse(&fetched.final_url)
            .or_else(|_| Url::parse(&page.url))
            .ok()
        else {
            audit_pages::record_failed(pool, page.id, "Unparseable page URL").await?;
            return Ok(None);
        };

        let analysis = analyze(&fetched.body, &page_url, scope);
        let report = seo::evaluate(&analysis);

        record.title = analysis.title.clone();
        record.meta_description = analysis.meta_description.clone();
        record.h1_count = count(analysis.h1_count);
        record.word_count = count(analysis.word_count);
        record.image_count = count(analysis.image_count);
        record.images_missing_alt = count(analysis.images_missing_alt);
        record.internal_links = count(analysis.internal_links.len());
        record.external_links = count(analysis.external_links.len());
        record.has_structured_data = analysis.has_structured_data;
        record.seo_score = i64::from(report.score);
        record.issues = issues_json(report.issues, perf.issues)?;
        audit_pages::record_crawled(pool, page.id, &record).await?;

        let next_depth = page.depth + 1;
        if next_depth <= i64::from(self.settings.max_depth) && !analysis.internal_links.is_empty() {
            let added = audit_pages::enqueue(
                pool,
                &audit.id,
                &analysis.internal_links,
                next_depth,
                audit.max_pages,
            )
            .await?;
            debug!(audit_id = %audit.id, url = %page.url, added, "Links enqueued");
        }

        Ok(Some(GeoPageInput::from_analysis(page.url.clone(), &analysis)))
    }

    async fn score_geo(&self, pages: &[(i64, GeoPageInput)], deadline: Instant) -> Result<()> {
        let inputs: Vec<GeoPageInput> = pages.iter().map(|(_, input)| input.clone()).collect();
        let scores = self.geo.score_pages_until(&inputs, deadline).await;

        for ((page_id, _), score) in pages.iter().zip(scores) {
            let details = serde_json::to_value(&score)?;
            audit_pages::record_geo(self.db.pool(), *page_id, score.score, &details).await?;
        }
        Ok(())
    }

    async fn build_report(&self, audit: &Audit) -> Result<(Option<i64>, AuditReport)> {
        let pages = audit_pages::list_for_audit(self.db.pool(), &audit.id, None).await?;

        let mut builder = SummaryBuilder::new();
        let mut geo_pages = Vec::new();
        for page in &pages {
            match page.status {
                PageStatus::Crawled => {
                    let issues: Vec<Issue> = match &page.issues {
                        Some(raw) => serde_json::from_value(raw.clone())?,
                        None => Vec::new(),
                    };
                    builder.add_page(
                        page.seo_score.unwrap_or(0),
                        page.performance_score.unwrap_or(0),
                        &issues,
                    );
                    if let Some(details) = &page.geo_details {
                        match serde_json::from_value::<PageGeoScore>(details.clone()) {
                            Ok(score) => geo_pages.push(score),
                            Err(e) => warn!(url = %page.url, error = %e, "Unreadable GEO details"),
                        }
                    }
                }
                PageStatus::Failed => builder.add_failed(),
                PageStatus::Queued => {}
            }
        }

        let crawl = builder.build();
        let (overall, geo) = match audit.kind {
            AuditKind::Seo => (crawl.overall_score, None),
            AuditKind::Geo => {
                let geo = aggregate(&geo_pages);
                (geo.score, Some(geo))
            }
        };
        Ok((overall, AuditReport { crawl, geo }))
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn issues_json(mut issues: Vec<Issue>, extra: Vec<Issue>) -> Result<serde_json::Value> {
    issues.extend(extra);
    issues.sort_by_key(|i| i.severity);
    Ok(serde_json::to_value(issues)?)
}
