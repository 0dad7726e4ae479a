//! Cursor-paginated retrieval of candidate records from the remote works index.
//!
//! Pagination walks `meta.next_cursor` until the server stops returning one or
//! `max_pages` is reached. A transport error or non-2xx response on any page
//! aborts further pagination for that run but keeps the pages already
//! collected; filtering of duplicates and invalid records happens downstream.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

const WORKS_URL: &str = "https://api.openalex.org/works";
const USER_AGENT: &str = "sysrev/0.2";

/// Document types requested from the index.
const TYPE_ALLOWLIST: &str = "type:article|review";

/// One retrieval query: topic, optional synonym expansion, year window and
/// pagination bounds.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub topic: String,
    /// Extra terms ORed into the search string.
    pub synonyms: Vec<String>,
    /// Inclusive `start-end` year range; malformed ranges are ignored.
    pub year_range: Option<String>,
    pub per_page: u32,
    pub max_pages: u32,
}

impl SearchQuery {
    /// The free-text search string sent to the index.
    pub fn search_text(&self) -> String {
        let mut terms = vec![self.topic.trim().to_string()];
        terms.extend(
            self.synonyms
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
        terms.join(" OR ")
    }

    /// Comma-joined filter expression: document-type allowlist plus
    /// publication-date bounds when the year range parses.
    pub fn filter_expr(&self) -> String {
        let mut parts = vec![TYPE_ALLOWLIST.to_string()];
        if let Some((start, end)) = self.parsed_years() {
            parts.push(format!("from_publication_date:{start}-01-01"));
            parts.push(format!("to_publication_date:{end}-12-31"));
        }
        parts.join(",")
    }

    /// Parse the `start-end` range. Malformed or inverted ranges yield `None`.
    pub fn parsed_years(&self) -> Option<(i32, i32)> {
        let raw = self.year_range.as_deref()?.trim();
        let (a, b) = raw.split_once('-')?;
        let start: i32 = a.trim().parse().ok()?;
        let end: i32 = b.trim().parse().ok()?;
        (start <= end).then_some((start, end))
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey {
            search: self.search_text(),
            years: self.year_range.clone().unwrap_or_default(),
            per_page: self.per_page,
            max_pages: self.max_pages,
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct CacheKey {
    search: String,
    years: String,
    per_page: u32,
    max_pages: u32,
}

/// In-session memoization of retrieval results, keyed by the full query shape.
///
/// Purely an optimization: entries may be invalidated at any time without
/// correctness impact.
#[derive(Default)]
pub struct RetrievalCache {
    entries: DashMap<CacheKey, Arc<Vec<Value>>>,
}

impl RetrievalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch raw candidate records for `query`, walking the cursor until
/// exhaustion or `max_pages`.
pub async fn fetch_candidates(
    query: &SearchQuery,
    client: &reqwest::Client,
    timeout: Duration,
    cache: Option<&RetrievalCache>,
) -> Vec<Value> {
    if let Some(cache) = cache
        && let Some(hit) = cache.entries.get(&query.cache_key())
    {
        tracing::debug!(topic = %query.topic, "retrieval cache hit");
        return hit.as_ref().clone();
    }

    let records = fetch_pages(query, client, timeout, WORKS_URL).await;

    if let Some(cache) = cache {
        cache
            .entries
            .insert(query.cache_key(), Arc::new(records.clone()));
    }
    records
}

async fn fetch_pages(
    query: &SearchQuery,
    client: &reqwest::Client,
    timeout: Duration,
    base_url: &str,
) -> Vec<Value> {
    let mut records: Vec<Value> = Vec::new();
    let mut cursor = String::from("*");

    for page in 0..query.max_pages.max(1) {
        let url = format!(
            "{}?search={}&filter={}&per-page={}&sort=relevance_score:desc&cursor={}",
            base_url,
            urlencoding::encode(&query.search_text()),
            urlencoding::encode(&query.filter_expr()),
            query.per_page.max(1),
            urlencoding::encode(&cursor),
        );

        let resp = match client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(page, error = %e, "page fetch failed, keeping partial results");
                break;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(page, %status, "page fetch returned non-2xx, keeping partial results");
            break;
        }

        let data: Value = match resp.json().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(page, error = %e, "page body unreadable, keeping partial results");
                break;
            }
        };

        if let Some(results) = data["results"].as_array() {
            records.extend(results.iter().cloned());
        }

        match data["meta"]["next_cursor"].as_str() {
            Some(next) if !next.is_empty() => cursor = next.to_string(),
            _ => break,
        }
    }

    tracing::debug!(count = records.len(), "retrieval complete");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(years: Option<&str>) -> SearchQuery {
        SearchQuery {
            topic: "green growth".into(),
            synonyms: vec![],
            year_range: years.map(String::from),
            per_page: 25,
            max_pages: 2,
        }
    }

    #[test]
    fn filter_includes_date_bounds() {
        let q = query(Some("2015-2024"));
        assert_eq!(
            q.filter_expr(),
            "type:article|review,from_publication_date:2015-01-01,to_publication_date:2024-12-31"
        );
    }

    #[test]
    fn malformed_year_range_is_ignored() {
        for bad in [Some("abcd-2020"), Some("2020"), Some(""), None] {
            let q = query(bad);
            assert_eq!(q.filter_expr(), "type:article|review");
        }
    }

    #[test]
    fn inverted_year_range_is_ignored() {
        assert_eq!(query(Some("2024-2015")).parsed_years(), None);
    }

    #[test]
    fn synonyms_are_ored_into_search_text() {
        let mut q = query(None);
        q.synonyms = vec!["sustainable development".into(), "  ".into()];
        assert_eq!(q.search_text(), "green growth OR sustainable development");
    }

    #[test]
    fn cache_distinguishes_query_shapes() {
        let cache = RetrievalCache::new();
        let a = query(Some("2015-2024"));
        let mut b = a.clone();
        b.per_page = 50;

        cache.entries.insert(a.cache_key(), Arc::new(vec![json!({"id": "W1"})]));
        assert!(cache.entries.get(&a.cache_key()).is_some());
        assert!(cache.entries.get(&b.cache_key()).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
