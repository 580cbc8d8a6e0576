//! Continuation triggers: how a released batch asks for the next one.

use crate::error::{Result, RunnerError};
use crate::runner::BatchRunner;
use async_trait::async_trait;
use searchlight_core::AuditId;
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the shared secret on continuation calls.
pub const CONTINUATION_SECRET_HEADER: &str = "x-continuation-secret";

/// Arms the next batch of an audit.
///
/// Implementations return once the request is handed off; they do not wait
/// for the batch to run.
#[async_trait]
pub trait ContinuationTrigger: Send + Sync {
    /// Schedule another batch for `audit_id`.
    async fn schedule(&self, audit_id: &AuditId) -> Result<()>;
}

/// Re-invokes the service over HTTP, so the next batch runs in a fresh
/// request with its own time budget.
#[derive(Debug, Clone)]
pub struct HttpContinuation {
    client: reqwest::Client,
    base_url: url::Url,
    secret: String,
}

impl HttpContinuation {
    /// Trigger posting to `{base_url}/api/audits/{id}/continue`.
    pub fn new(base_url: &str, secret: impl Into<String>) -> Result<Self> {
        let mut base_url = url::Url::parse(base_url)
            .map_err(|e| RunnerError::Continuation(format!("invalid base URL {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RunnerError::Continuation(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            secret: secret.into(),
        })
    }

    /// Endpoint for one audit.
    pub fn endpoint(&self, audit_id: &AuditId) -> Result<url::Url> {
        self.base_url
            .join(&format!("api/audits/{audit_id}/continue"))
            .map_err(|e| RunnerError::Continuation(e.to_string()))
    }
}

#[async_trait]
impl ContinuationTrigger for HttpContinuation {
    async fn schedule(&self, audit_id: &AuditId) -> Result<()> {
        let endpoint = self.endpoint(audit_id)?;
        let request = self
            .client
            .post(endpoint.clone())
            .header(CONTINUATION_SECRET_HEADER, &self.secret);
        let audit_id = audit_id.clone();

        // Fire and forget: a lost call is re-armed by the sweeper.
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(audit_id = %audit_id, "Continuation accepted");
                }
                Ok(response) => {
                    warn!(
                        audit_id = %audit_id,
                        status = response.status().as_u16(),
                        %endpoint,
                        "Continuation rejected"
                    );
                }
                Err(e) => {
                    warn!(audit_id = %audit_id, error = %e, %endpoint, "Continuation call failed");
                }
            }
        });
        Ok(())
    }
}

/// Runs the next batch on the current tokio runtime.
///
/// Holds a weak handle so the runner and its trigger do not keep each other
/// alive; see [`BatchRunner::in_process`].
#[derive(Debug, Clone)]
pub struct InProcessContinuation {
    runner: Weak<BatchRunner>,
}

impl InProcessContinuation {
    /// Trigger bound to a runner.
    #[must_use]
    pub fn new(runner: Weak<BatchRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ContinuationTrigger for InProcessContinuation {
    async fn schedule(&self, audit_id: &AuditId) -> Result<()> {
        let Some(runner) = self.runner.upgrade() else {
            warn!(audit_id = %audit_id, "Runner dropped, continuation skipped");
            return Ok(());
        };
        let audit_id = audit_id.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run_batch(&audit_id).await {
                warn!(audit_id = %audit_id, error = %e, "Continued batch failed");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_endpoint() {
        let id = AuditId::generate();
        let trigger = HttpContinuation::new("https://audits.example.com", "s3cret").unwrap();
        assert_eq!(
            trigger.endpoint(&id).unwrap().as_str(),
            format!("https://audits.example.com/api/audits/{id}/continue")
        );

        // base paths are kept
        let trigger = HttpContinuation::new("https://example.com/searchlight", "s").unwrap();
        assert!(trigger
            .endpoint(&id)
            .unwrap()
            .as_str()
            .starts_with("https://example.com/searchlight/api/audits/"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpContinuation::new("not a url", "s"),
            Err(RunnerError::Continuation(_))
        ));
    }

    #[tokio::test]
    async fn test_in_process_without_runner_is_noop() {
        let trigger = InProcessContinuation::new(Weak::new());
        assert!(trigger.schedule(&AuditId::generate()).await.is_ok());
    }
}
