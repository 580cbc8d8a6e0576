//! Shared fixtures for runner integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use searchlight_core::{AuditId, AuditKind, OrganizationId};
use searchlight_crawler::{CrawlError, FetchedPage, PageFetcher, RetryPolicy};
use searchlight_db::audits::{self, Audit};
use searchlight_db::{organizations, Database};
use searchlight_runner::{ContinuationTrigger, RunnerSettings};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SITE: &str = "https://site.test";

pub async fn setup_db() -> Arc<Database> {
    let db = Database::in_memory().await.expect("open database");
    db.run_migrations().await.expect("run migrations");
    Arc::new(db)
}

pub async fn seed_org(db: &Database, slug: &str) -> OrganizationId {
    organizations::create_organization(db.pool(), "Acme Agency", slug)
        .await
        .expect("create organization")
        .id
}

pub async fn create_audit(
    db: &Database,
    org: &OrganizationId,
    target: &str,
    kind: AuditKind,
    max_pages: i64,
) -> Audit {
    audits::create_audit(db.pool(), org, None, target, kind, max_pages)
        .await
        .expect("create audit")
}

pub async fn reload(db: &Database, id: &AuditId) -> Audit {
    audits::get(db.pool(), id)
        .await
        .expect("get audit")
        .expect("audit exists")
}

pub fn settings(batch_size: u32) -> RunnerSettings {
    RunnerSettings {
        batch_size,
        time_budget: Duration::from_secs(30),
        safety_margin: Duration::from_secs(5),
        concurrency: 2,
        max_depth: 3,
        retry: RetryPolicy {
            max_attempts: 1,
            retry_delay: Duration::from_millis(1),
        },
    }
}

pub fn html(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">{href}</a>"))
        .collect();
    format!(
        "<!doctype html><html lang=\"en\"><head><title>{title} | Acme widgets and gadgets</title>\
         <meta name=\"description\" content=\"Everything you need to know about {title}, \
         explained by the Acme team with examples, pricing and answers to common questions.\">\
         <meta name=\"viewport\" content=\"width=device-width\">\
         <link rel=\"canonical\" href=\"{SITE}/\"></head>\
         <body><h1>{title}</h1><h2>Overview</h2><p>{}</p>{anchors}</body></html>",
        "Acme builds reliable widgets for teams. ".repeat(40)
    )
}

#[derive(Clone)]
pub enum Reply {
    Html(String),
    Status(u16),
    Json,
    Unreachable,
}

/// In-memory website.
pub struct FakeSite {
    pages: HashMap<String, Reply>,
    delay: Duration,
    slow: HashMap<String, Duration>,
    fetched: Mutex<Vec<String>>,
    cancel_on: Mutex<Option<(String, Arc<Database>, AuditId)>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            delay: Duration::ZERO,
            slow: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
            cancel_on: Mutex::new(None),
        }
    }

    pub fn page(mut self, path: &str, links: &[&str]) -> Self {
        self.pages
            .insert(format!("{SITE}{path}"), Reply::Html(html(path, links)));
        self
    }

    pub fn reply(mut self, path: &str, reply: Reply) -> Self {
        self.pages.insert(format!("{SITE}{path}"), reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A page that takes `delay` to answer, on top of the site-wide delay.
    pub fn slow_page(mut self, path: &str, links: &[&str], delay: Duration) -> Self {
        self.slow.insert(format!("{SITE}{path}"), delay);
        self.page(path, links)
    }

    /// Cancel `audit` when `path` is fetched.
    pub fn cancel_on(&self, path: &str, db: Arc<Database>, audit: AuditId) {
        *self.cancel_on.lock().unwrap() = Some((format!("{SITE}{path}"), db, audit));
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &str) -> searchlight_crawler::Result<FetchedPage> {
        self.fetched.lock().unwrap().push(url.to_string());
        let delay = self.delay + self.slow.get(url).copied().unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let cancel = {
            let mut slot = self.cancel_on.lock().unwrap();
            if slot.as_ref().is_some_and(|(target, _, _)| target == url) {
                slot.take()
            } else {
                None
            }
        };
        if let Some((_, db, audit)) = cancel {
            audits::cancel(db.pool(), &audit, &searchlight_core::time::now())
                .await
                .expect("cancel audit");
        }

        let page = |status: u16, content_type: &str, body: String| FetchedPage {
            final_url: url.to_string(),
            status,
            content_type: Some(content_type.to_string()),
            body,
            elapsed: Duration::from_millis(120),
        };

        match self.pages.get(url).cloned() {
            Some(Reply::Html(body)) => Ok(page(200, "text/html; charset=utf-8", body)),
            Some(Reply::Status(status)) => Ok(page(status, "text/html", "error".to_string())),
            Some(Reply::Json) => Ok(page(200, "application/json", "{}".to_string())),
            Some(Reply::Unreachable) => Err(CrawlError::Connection {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
            None => Ok(page(404, "text/html", "not found".to_string())),
        }
    }
}

/// Records scheduled continuations without running them.
#[derive(Default)]
pub struct RecordingTrigger {
    scheduled: Mutex<Vec<AuditId>>,
}

impl RecordingTrigger {
    pub fn scheduled(&self) -> Vec<AuditId> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContinuationTrigger for RecordingTrigger {
    async fn schedule(&self, audit_id: &AuditId) -> searchlight_runner::Result<()> {
        self.scheduled.lock().unwrap().push(audit_id.clone());
        Ok(())
    }
}
