//! One-run orchestration: retrieve → normalize → validity → funnel →
//! bibliography → per-section generation with citation enforcement.
//!
//! The bibliography is frozen before any generation begins; that ordering is
//! a hard precondition, not a convention. A section whose generation
//! exhausts its retries fails alone — completed sections are kept and the
//! failure is surfaced by name.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::bibliography::Bibliography;
use crate::citations::enforce_citations;
use crate::funnel::{FunnelCounters, run_funnel};
use crate::generate::{GenerateError, GenerationBackend, GenerationRequest, generate_with_retry};
use crate::normalize::normalize_record;
use crate::prompt::{manuscript_sections, section_prompt, strip_code_fences, system_instruction};
use crate::retrieve::{RetrievalCache, SearchQuery, fetch_candidates};
use crate::retry::RetryPolicy;
use crate::validity::is_valid;
use crate::{GeneratedSection, Source};

/// DOI checks are independent per source; bound their concurrency instead of
/// serializing them.
const DOI_CHECK_CONCURRENCY: usize = 8;

/// Configuration values consumed by the core pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub topic: String,
    /// Synonym terms ORed into the search string.
    pub synonyms: Vec<String>,
    /// Inclusive `start-end` year range; malformed ranges are ignored.
    pub year_range: Option<String>,
    pub per_page: u32,
    pub max_pages: u32,
    pub max_sources: usize,
    /// Live DOI resolution; when off, any non-empty DOI string is accepted.
    pub verify_doi: bool,
    /// Word-count hint per full-length section.
    pub section_words: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            synonyms: vec![],
            year_range: None,
            per_page: 25,
            max_pages: 4,
            max_sources: 20,
            verify_doi: false,
            section_words: 300,
            temperature: 0.4,
            max_output_tokens: 2048,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn search_query(&self) -> SearchQuery {
        SearchQuery {
            topic: self.topic.clone(),
            synonyms: self.synonyms.clone(),
            year_range: self.year_range.clone(),
            per_page: self.per_page,
            max_pages: self.max_pages,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The funnel emptied: nothing citable survived, so no prose is
    /// generated. Carries the counters so the caller can report the funnel.
    #[error("no qualifying sources found")]
    NoQualifyingSources { counters: FunnelCounters },
}

/// A section whose generation exhausted its retries.
#[derive(Debug)]
pub struct SectionFailure {
    pub title: String,
    pub error: GenerateError,
}

/// Everything a downstream renderer needs from one run.
#[derive(Debug)]
pub struct Report {
    pub topic: String,
    pub counters: FunnelCounters,
    pub bibliography: Bibliography,
    pub sections: Vec<GeneratedSection>,
    pub failures: Vec<SectionFailure>,
}

/// Normalize raw records, annotate validity (bounded-concurrency DOI checks,
/// order preserved) and run the funnel.
pub async fn screen_records(
    config: &RunConfig,
    raw: Vec<Value>,
    client: &reqwest::Client,
) -> (Vec<Source>, FunnelCounters) {
    let sources: Vec<Source> = raw.iter().map(normalize_record).collect();

    let timeout = config.timeout();
    let valid: Vec<bool> = futures_util::stream::iter(sources.iter())
        .map(|s| is_valid(s, client, timeout, config.verify_doi))
        .buffered(DOI_CHECK_CONCURRENCY)
        .collect()
        .await;

    run_funnel(sources, &valid, &config.topic, config.max_sources)
}

/// Retrieval plus screening: the funnel half of a run.
pub async fn screen(
    config: &RunConfig,
    client: &reqwest::Client,
    cache: Option<&RetrievalCache>,
) -> (Vec<Source>, FunnelCounters) {
    let raw = fetch_candidates(&config.search_query(), client, config.timeout(), cache).await;
    screen_records(config, raw, client).await
}

/// Generate the manuscript against a frozen survivor list.
///
/// Fails up front with [`PipelineError::NoQualifyingSources`] when the
/// survivor list is empty — the run never proceeds to uncited prose.
pub async fn generate_manuscript(
    config: &RunConfig,
    survivors: Vec<Source>,
    counters: FunnelCounters,
    backend: &dyn GenerationBackend,
    client: &reqwest::Client,
) -> Result<Report, PipelineError> {
    if survivors.is_empty() {
        return Err(PipelineError::NoQualifyingSources { counters });
    }

    // Frozen before any generation call; indices never change from here on.
    let bibliography = Bibliography::assemble(survivors);
    let n_sources = bibliography.len();
    let system = system_instruction();
    let timeout = config.timeout();

    let mut sections = Vec::new();
    let mut failures = Vec::new();

    for section in manuscript_sections(config.section_words) {
        let request = GenerationRequest {
            system: system.clone(),
            prompt: section_prompt(&section, &config.topic, &counters, &bibliography),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        };

        match generate_with_retry(backend, &request, client, timeout, &config.retry).await {
            Ok(text) => {
                let text = enforce_citations(&strip_code_fences(&text), n_sources);
                sections.push(GeneratedSection {
                    title: section.title,
                    text,
                });
            }
            Err(error) => {
                tracing::warn!(
                    section = %section.title,
                    backend = backend.name(),
                    error = %error,
                    "section generation failed"
                );
                failures.push(SectionFailure {
                    title: section.title,
                    error,
                });
            }
        }
    }

    Ok(Report {
        topic: config.topic.clone(),
        counters,
        bibliography,
        sections,
        failures,
    })
}

/// A complete run: retrieval, screening, bibliography assembly, generation.
pub async fn run(
    config: &RunConfig,
    backend: &dyn GenerationBackend,
    client: &reqwest::Client,
    cache: Option<&RetrievalCache>,
) -> Result<Report, PipelineError> {
    let (survivors, counters) = screen(config, client, cache).await;
    generate_manuscript(config, survivors, counters, backend, client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::mock::MockBackend;
    use serde_json::json;

    fn record(title: &str, doi: Option<&str>) -> Value {
        json!({
            "id": format!("https://openalex.org/W-{title}"),
            "title": title,
            "publication_date": "2020-01-01",
            "doi": doi,
        })
    }

    fn config() -> RunConfig {
        RunConfig {
            topic: "green growth".into(),
            max_sources: 20,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn screening_gates_on_validity_and_dedup() {
        let raw = vec![
            record("Green growth one", Some("10.1/a")),
            record("Green Growth One", Some("10.1/a2")), // duplicate title
            record("Green growth two", None),            // no doi, no url
            record("Green growth three", Some("10.1/c")),
        ];
        let client = reqwest::Client::new();
        let (survivors, counters) = screen_records(&config(), raw, &client).await;

        assert_eq!(counters.initial, 4);
        assert_eq!(counters.deduped, 2);
        assert_eq!(survivors.len(), 2);
        assert!(counters.is_monotonic());
        // No source lacking both DOI and URL ever survives
        assert!(survivors.iter().all(|s| s.doi.is_some() || s.has_locator()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_funnel_is_a_distinct_outcome() {
        let backend = MockBackend::always(Ok("prose".into()));
        let client = reqwest::Client::new();
        let counters = FunnelCounters {
            initial: 3,
            ..Default::default()
        };
        let err = generate_manuscript(&config(), vec![], counters, &backend, &client)
            .await
            .unwrap_err();
        match err {
            PipelineError::NoQualifyingSources { counters } => {
                assert_eq!(counters.initial, 3);
            }
        }
        // The run never reached the generator.
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sections_are_generated_and_enforced() {
        let backend = MockBackend::always(Ok("Evidence grew [1][2][9].".into()));
        let client = reqwest::Client::new();
        let survivors = vec![
            Source {
                title: "Paper one".into(),
                doi: Some("10.1/a".into()),
                ..Default::default()
            },
            Source {
                title: "Paper two".into(),
                doi: Some("10.1/b".into()),
                ..Default::default()
            },
        ];
        let counters = FunnelCounters {
            initial: 2,
            deduped: 2,
            screened_title: 2,
            screened_abstract: 2,
            included_fulltext: 2,
        };

        let report = generate_manuscript(&config(), survivors, counters, &backend, &client)
            .await
            .unwrap();

        assert_eq!(report.sections.len(), 7);
        assert!(report.failures.is_empty());
        assert_eq!(report.bibliography.len(), 2);
        for section in &report.sections {
            assert_eq!(section.text, "Evidence grew [1][2].");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_section_does_not_discard_completed_ones() {
        // First section succeeds, everything after fails permanently.
        let mut responses = vec![Ok("Intro [1].".to_string())];
        responses.extend(
            std::iter::repeat_with(|| Err(GenerateError::Status(500)))
                .take(100)
                .collect::<Vec<_>>(),
        );
        let backend = MockBackend::with_sequence(responses);
        let client = reqwest::Client::new();
        let survivors = vec![Source {
            title: "Paper one".into(),
            doi: Some("10.1/a".into()),
            ..Default::default()
        }];
        let counters = FunnelCounters {
            initial: 1,
            deduped: 1,
            screened_title: 1,
            screened_abstract: 1,
            included_fulltext: 1,
        };

        let report = generate_manuscript(&config(), survivors, counters, &backend, &client)
            .await
            .unwrap();

        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].title, "Introduction");
        assert_eq!(report.failures.len(), 6);
        assert_eq!(report.failures[0].title, "Methods");
    }
}
