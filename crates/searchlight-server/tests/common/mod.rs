//! Shared fixtures for API tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use searchlight_core::AuditId;
use searchlight_crawler::{FetchedPage, PageFetcher, RetryPolicy};
use searchlight_db::Database;
use searchlight_runner::{
    BatchRunner, ContinuationTrigger, RunnerSettings, SweepPolicy, CONTINUATION_SECRET_HEADER,
};
use searchlight_server::{build_router, ApiSettings, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const SECRET: &str = "test-continuation-secret";

/// Every URL answers with the same link-free page.
pub struct OnePageSite;

#[async_trait]
impl PageFetcher for OnePageSite {
    async fn fetch(&self, url: &str) -> searchlight_crawler::Result<FetchedPage> {
        Ok(FetchedPage {
            final_url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: "<html lang=\"en\"><head><title>Acme widgets for every team</title></head>\
                   <body><h1>Widgets</h1><p>Reliable widgets.</p></body></html>"
                .to_string(),
            elapsed: Duration::from_millis(50),
        })
    }
}

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

pub struct TestApp {
    pub db: Arc<Database>,
    pub router: Router,
    pub trigger: Arc<RecordingTrigger>,
}

fn runner_settings() -> RunnerSettings {
    RunnerSettings {
        batch_size: 5,
        time_budget: Duration::from_secs(30),
        safety_margin: Duration::from_secs(5),
        concurrency: 2,
        max_depth: 2,
        retry: RetryPolicy {
            max_attempts: 1,
            retry_delay: Duration::from_millis(1),
        },
    }
}

fn api_settings() -> ApiSettings {
    ApiSettings {
        session_ttl: chrono::Duration::hours(1),
        invite_ttl: chrono::Duration::days(1),
        default_max_pages: 10,
        continuation_secret: Some(SECRET.to_string()),
        sweep: SweepPolicy::default(),
    }
}

async fn setup_db() -> Arc<Database> {
    let db = Database::in_memory().await.expect("open database");
    db.run_migrations().await.expect("run migrations");
    Arc::new(db)
}

impl TestApp {
    /// Continuations are recorded, not run.
    pub async fn new() -> Self {
        let db = setup_db().await;
        let trigger = Arc::new(RecordingTrigger::default());
        let runner = Arc::new(BatchRunner::new(
            db.clone(),
            Arc::new(OnePageSite),
            None,
            trigger.clone(),
            runner_settings(),
        ));
        let router = build_router(AppState::new(db.clone(), runner, api_settings()));
        Self { db, router, trigger }
    }

    /// Continuations run on the test runtime.
    pub async fn in_process() -> Self {
        let db = setup_db().await;
        let runner = BatchRunner::in_process(db.clone(), Arc::new(OnePageSite), None, runner_settings());
        let router = build_router(AppState::new(db.clone(), runner, api_settings()));
        Self {
            db,
            router,
            trigger: Arc::new(RecordingTrigger::default()),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn continue_audit(&self, audit_id: &str, secret: Option<&str>) -> StatusCode {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/audits/{audit_id}/continue"));
        if let Some(secret) = secret {
            builder = builder.header(CONTINUATION_SECRET_HEADER, secret);
        }
        self.send(builder.body(Body::empty()).expect("request")).await.0
    }

    /// Sign up an organization; returns `(org_id, admin_user_id, token)`.
    pub async fn signup(&self, slug: &str) -> (String, String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/signup",
                None,
                Some(json!({
                    "organization_name": format!("{slug} agency"),
                    "slug": slug,
                    "email": format!("owner@{slug}.example"),
                    "display_name": "Owner"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        (
            body["organization"]["id"].as_str().expect("org id").to_string(),
            body["user"]["id"].as_str().expect("user id").to_string(),
            body["token"].as_str().expect("token").to_string(),
        )
    }

    /// Invite and sign in a member with `role`; returns their token.
    pub async fn add_member(&self, org: &str, admin_token: &str, email: &str, role: &str) -> String {
        let (status, invite) = self
            .post(
                &format!("/api/organizations/{org}/invites"),
                admin_token,
                json!({"email": email, "role": role}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "invite failed: {invite}");

        let (status, session) = self
            .call(
                Method::POST,
                "/api/invites/accept",
                None,
                Some(json!({"token": invite["token"], "display_name": "Member"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "accept failed: {session}");
        session["token"].as_str().expect("token").to_string()
    }
}
