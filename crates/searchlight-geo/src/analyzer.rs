//! LLM-backed GEO analyzer.

use crate::error::Result;
use crate::heuristic;
use crate::page::{GeoPageInput, PageGeoScore, ScoreSource};
use crate::prompt::{build_prompt, parse_response, url_key, ParsedPageScore, SYSTEM_PROMPT};
use searchlight_core::LlmConfig;
use searchlight_llm::{CompletionRequest, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Attempts per chunk for retryable provider errors.
const MAX_ATTEMPTS: u32 = 2;

/// Base delay between attempts.
const RETRY_DELAY_MS: u64 = 1000;

/// Scores pages for GEO readiness, chunk by chunk.
///
/// Pages the model does not return, and whole chunks whose call fails, fall
/// back to [`heuristic::score_page`] so a flaky provider never stalls an audit.
#[derive(Clone)]
pub struct GeoAnalyzer {
    provider: Option<Arc<dyn LlmProvider>>,
    chunk_size: usize,
    excerpt_chars: usize,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for GeoAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoAnalyzer")
            .field("provider", &self.provider.as_ref().map(|p| p.provider_id().to_string()))
            .field("chunk_size", &self.chunk_size)
            .field("excerpt_chars", &self.excerpt_chars)
            .finish_non_exhaustive()
    }
}

impl GeoAnalyzer {
    /// Analyzer backed by an LLM provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, chunk_size: usize, excerpt_chars: usize) -> Self {
        let defaults = LlmConfig::default();
        Self {
            provider: Some(provider),
            chunk_size: chunk_size.max(1),
            excerpt_chars,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    /// Analyzer that only uses on-page signals.
    #[must_use]
    pub fn heuristic_only() -> Self {
        let defaults = LlmConfig::default();
        Self {
            provider: None,
            chunk_size: defaults.geo_chunk_size,
            excerpt_chars: defaults.excerpt_chars,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    /// Build from configuration and an optional provider.
    #[must_use]
    pub fn from_config(config: &LlmConfig, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            provider,
            chunk_size: config.geo_chunk_size.max(1),
            excerpt_chars: config.excerpt_chars,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Whether an LLM is attached.
    #[must_use]
    pub fn uses_llm(&self) -> bool {
        self.provider.is_some()
    }

    /// Score pages, one result per input in input order.
    pub async fn score_pages(&self, pages: &[GeoPageInput]) -> Vec<PageGeoScore> {
        self.score(pages, None).await
    }

    /// Like [`GeoAnalyzer::score_pages`], but no LLM call runs past `deadline`.
    ///
    /// A chunk still waiting on the provider at the deadline, and every chunk
    /// after it, gets heuristic scores.
    pub async fn score_pages_until(
        &self,
        pages: &[GeoPageInput],
        deadline: Instant,
    ) -> Vec<PageGeoScore> {
        self.score(pages, Some(deadline)).await
    }

    async fn score(&self, pages: &[GeoPageInput], deadline: Option<Instant>) -> Vec<PageGeoScore> {
        let Some(provider) = &self.provider else {
            return pages.iter().map(heuristic::score_page).collect();
        };

        let mut results = Vec::with_capacity(pages.len());
        for (index, chunk) in pages.chunks(self.chunk_size).enumerate() {
            let scored = match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    debug!(chunk = index, "GEO deadline passed, skipping LLM call");
                    None
                }
                Some(deadline) => {
                    match timeout_at(deadline, self.score_chunk(provider.as_ref(), chunk)).await {
                        Ok(scored) => Some(scored),
                        Err(_) => {
                            warn!(chunk = index, pages = chunk.len(), "GEO call cut off at deadline");
                            None
                        }
                    }
                }
                None => Some(self.score_chunk(provider.as_ref(), chunk).await),
            };

            match scored {
                Some(Ok(parsed)) => results.extend(merge_chunk(chunk, parsed)),
                Some(Err(e)) => {
                    warn!(
                        chunk = index,
                        pages = chunk.len(),
                        error = %e,
                        "GEO scoring failed, using heuristic scores for chunk"
                    );
                    results.extend(chunk.iter().map(heuristic::score_page));
                }
                None => results.extend(chunk.iter().map(heuristic::score_page)),
            }
        }

        info!(
            pages = pages.len(),
            llm_scored = results.iter().filter(|r| r.source == ScoreSource::Llm).count(),
            "GEO scoring finished"
        );
        results
    }

    async fn score_chunk(
        &self,
        provider: &dyn LlmProvider,
        chunk: &[GeoPageInput],
    ) -> Result<Vec<ParsedPageScore>> {
        let request = CompletionRequest::new(build_prompt(chunk, self.excerpt_chars))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_json_output();

        let mut attempt = 0;
        loop {
            match provider.complete(request.clone()).await {
                Ok(response) => {
                    debug!(
                        provider = provider.provider_id(),
                        tokens = response.usage.map(|u| u.total_tokens()),
                        "GEO chunk scored"
                    );
                    if response.truncated() {
                        warn!(pages = chunk.len(), "GEO reply hit the token cap");
                    }
                    return parse_response(&response.content);
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    warn!(attempt, error = %e, "GEO call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                        .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn merge_chunk(chunk: &[GeoPageInput], parsed: Vec<ParsedPageScore>) -> Vec<PageGeoScore> {
    let mut by_url: HashMap<String, ParsedPageScore> = parsed
        .into_iter()
        .map(|p| (url_key(&p.url), p))
        .collect();

    chunk
        .iter()
        .map(|page| match by_url.remove(&url_key(&page.url)) {
            Some(p) if !p.scores.is_empty() => {
                PageGeoScore::new(&page.url, p.scores, p.recommendations, ScoreSource::Llm)
            }
            _ => {
                debug!(url = %page.url, "page missing from GEO reply, using heuristic score");
                heuristic::score_page(page)
            }
        })
        .collect()
}
