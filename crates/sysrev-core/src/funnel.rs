//! The PRISMA-style screening funnel.
//!
//! Four ordered stages, each a pure function over the survivors of the
//! previous one: dedup combined with the validity gate, title-token screen,
//! abstract-token screen, and the size cap. The driver records one counter
//! per stage; the sequence of counts is non-increasing by construction.

use std::collections::HashSet;

use serde::Serialize;

use crate::Source;

/// Stage-survivor counts for one run, recorded once and never mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunnelCounters {
    /// Raw retrieved count before any filtering.
    pub initial: usize,
    /// Survivors of dedup combined with the validity gate.
    pub deduped: usize,
    pub screened_title: usize,
    pub screened_abstract: usize,
    pub included_fulltext: usize,
}

impl FunnelCounters {
    /// `initial ≥ deduped ≥ screened_title ≥ screened_abstract ≥ included_fulltext`.
    pub fn is_monotonic(&self) -> bool {
        self.initial >= self.deduped
            && self.deduped >= self.screened_title
            && self.screened_title >= self.screened_abstract
            && self.screened_abstract >= self.included_fulltext
    }
}

/// Topic tokens: substrings of length > 2 after splitting on whitespace,
/// commas and semicolons, lowercased.
pub fn topic_tokens(topic: &str) -> Vec<String> {
    topic
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Stage 1: drop empty titles, keep the first occurrence of each
/// case-insensitive title, and gate on `is_valid`.
///
/// `valid` is a parallel slice to `sources` (precomputed so the stage itself
/// stays pure and synchronous).
pub fn dedup(sources: Vec<Source>, valid: &[bool]) -> Vec<Source> {
    debug_assert_eq!(sources.len(), valid.len());
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    for (source, &is_valid) in sources.into_iter().zip(valid) {
        let key = source.title.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        // The first occurrence claims the title even when it fails validity;
        // later duplicates never resurrect it.
        seen.insert(key);
        if is_valid {
            kept.push(source);
        }
    }
    kept
}

/// Stage 2: keep sources whose lowercased title contains at least one topic
/// token.
///
/// Escape hatch: if fewer than `max(10, 0.3 × deduped)` sources survive, the
/// screen is a no-op and all deduped sources pass through — an
/// over-aggressive topic string must not starve the pipeline. Exactly at the
/// threshold the screened set stands.
pub fn title_screen(sources: Vec<Source>, tokens: &[String]) -> Vec<Source> {
    let deduped_count = sources.len();
    let kept: Vec<Source> = sources
        .iter()
        .filter(|s| {
            let title = s.title.to_lowercase();
            tokens.iter().any(|t| title.contains(t.as_str()))
        })
        .cloned()
        .collect();

    let threshold = 10.0_f64.max(0.3 * deduped_count as f64);
    if (kept.len() as f64) < threshold {
        tracing::debug!(
            kept = kept.len(),
            threshold,
            "title screen under threshold, relaxing"
        );
        return sources;
    }
    kept
}

/// Stage 3: for sources with an abstract, keep only those whose lowercased
/// abstract contains a topic token. Sources without an abstract pass through
/// unconditionally.
pub fn abstract_screen(sources: Vec<Source>, tokens: &[String]) -> Vec<Source> {
    sources
        .into_iter()
        .filter(|s| match s.abstract_text.as_deref() {
            Some(text) if !text.is_empty() => {
                let text = text.to_lowercase();
                tokens.iter().any(|t| text.contains(t.as_str()))
            }
            _ => true,
        })
        .collect()
}

/// Stage 4: order-preserving truncation to `max_sources`.
pub fn cap(mut sources: Vec<Source>, max_sources: usize) -> Vec<Source> {
    sources.truncate(max_sources);
    sources
}

/// Run all four stages over pre-annotated candidates, recording the counters.
pub fn run_funnel(
    sources: Vec<Source>,
    valid: &[bool],
    topic: &str,
    max_sources: usize,
) -> (Vec<Source>, FunnelCounters) {
    let mut counters = FunnelCounters {
        initial: sources.len(),
        ..Default::default()
    };
    let tokens = topic_tokens(topic);

    let survivors = dedup(sources, valid);
    counters.deduped = survivors.len();

    let survivors = title_screen(survivors, &tokens);
    counters.screened_title = survivors.len();

    let survivors = abstract_screen(survivors, &tokens);
    counters.screened_abstract = survivors.len();

    let survivors = cap(survivors, max_sources);
    counters.included_fulltext = survivors.len();

    tracing::info!(
        initial = counters.initial,
        deduped = counters.deduped,
        screened_title = counters.screened_title,
        screened_abstract = counters.screened_abstract,
        included = counters.included_fulltext,
        "funnel complete"
    );
    (survivors, counters)
}
