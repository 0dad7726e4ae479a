//! Per-source citability checks.
//!
//! A source is valid if its DOI resolves (or, with live verification
//! disabled, if it merely carries a non-empty DOI), falling back to the
//! presence of a usable landing/PDF URL. Network failures count as
//! "unresolved", never as errors.

use std::time::Duration;

use crate::Source;

/// Check whether a DOI resolves by issuing a HEAD request to the canonical
/// resolver, following redirects. Any status below 400 counts as resolvable;
/// transport failures and timeouts count as unresolved.
pub async fn resolve_doi(doi: &str, client: &reqwest::Client, timeout: Duration) -> bool {
    if doi.is_empty() {
        return false;
    }
    let url = format!("https://doi.org/{}", doi);
    match client
        .head(&url)
        .header("User-Agent", "sysrev/0.2")
        .timeout(timeout)
        .send()
        .await
    {
        Ok(resp) => resp.status().as_u16() < 400,
        Err(e) => {
            tracing::debug!(doi, error = %e, "DOI resolution failed, treating as unresolved");
            false
        }
    }
}

/// Decide whether a source is citable.
///
/// DOI first: with `verify_doi` set, a live resolver check; otherwise any
/// non-empty DOI string is accepted without a network call. An unresolved DOI
/// falls back to the URL-presence check. Safe to call concurrently for every
/// candidate — no shared state, no ordering requirement.
pub async fn is_valid(
    source: &Source,
    client: &reqwest::Client,
    timeout: Duration,
    verify_doi: bool,
) -> bool {
    if let Some(doi) = source.doi.as_deref().filter(|d| !d.is_empty()) {
        if !verify_doi {
            return true;
        }
        if resolve_doi(doi, client, timeout).await {
            return true;
        }
    }
    source.has_locator()
}
