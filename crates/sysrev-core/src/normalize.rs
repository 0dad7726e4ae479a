//! Ingestion-boundary normalization of raw search records.
//!
//! The remote works endpoint returns loosely-typed JSON. Everything is mapped
//! into [`Source`] here, and malformed or missing fields always resolve to an
//! absence value rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::Source;

/// Trim and collapse runs of whitespace to single spaces.
pub fn collapse_ws(s: &str) -> String {
    static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    WS.replace_all(s.trim(), " ").to_string()
}

/// Parse a 4-digit year from the first four characters of a free-form date.
///
/// `"2021-05-03"` → `Some(2021)`, `"May 2021"` → `None`. Never fails.
pub fn parse_year(date: &str) -> Option<i32> {
    let head: String = date.trim().chars().take(4).collect();
    if head.len() == 4 && head.chars().all(|c| c.is_ascii_digit()) {
        head.parse().ok()
    } else {
        None
    }
}

/// Strip the resolver scheme/host from a DOI-like string.
pub fn normalize_doi(raw: &str) -> String {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest;
            break;
        }
    }
    doi.to_string()
}

/// Reconstruct an abstract from either a plain string or an OpenAlex-style
/// word→positions inverted index.
///
/// For the inverted index, all (position, word) pairs are sorted ascending by
/// position and the words joined with single spaces.
pub fn reconstruct_abstract(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let text = collapse_ws(s);
            (!text.is_empty()).then_some(text)
        }
        Value::Object(index) => {
            let mut positioned: Vec<(i64, &str)> = Vec::new();
            for (word, positions) in index {
                if let Some(arr) = positions.as_array() {
                    for pos in arr.iter().filter_map(|p| p.as_i64()) {
                        positioned.push((pos, word.as_str()));
                    }
                }
            }
            if positioned.is_empty() {
                return None;
            }
            positioned.sort();
            let text = positioned
                .iter()
                .map(|(_, w)| *w)
                .collect::<Vec<_>>()
                .join(" ");
            Some(collapse_ws(&text))
        }
        _ => None,
    }
}

/// Flatten nested authorship structures into an ordered name list.
///
/// Entries without a resolvable display name are skipped.
fn extract_authors(raw: &Value) -> Vec<String> {
    raw["authorships"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    a["author"]["display_name"]
                        .as_str()
                        .or_else(|| a["display_name"].as_str())
                        .map(collapse_ws)
                        .filter(|n| !n.is_empty())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(collapse_ws)
        .filter(|s| !s.is_empty())
}

/// Map one raw record to the canonical [`Source`] shape.
///
/// Absent optional fields become `None`; an absent title becomes the empty
/// string and is dropped later by the funnel's dedup stage.
pub fn normalize_record(raw: &Value) -> Source {
    let title = non_empty_str(&raw["title"])
        .or_else(|| non_empty_str(&raw["display_name"]))
        .unwrap_or_default();

    let abstract_text = reconstruct_abstract(&raw["abstract"])
        .or_else(|| reconstruct_abstract(&raw["abstract_inverted_index"]));

    let year = raw["publication_date"]
        .as_str()
        .and_then(parse_year)
        .or_else(|| raw["publication_year"].as_i64().map(|y| y as i32));

    let venue = non_empty_str(&raw["primary_location"]["source"]["display_name"])
        .or_else(|| non_empty_str(&raw["host_venue"]["display_name"]));

    let doi = raw["doi"]
        .as_str()
        .map(normalize_doi)
        .filter(|d| !d.is_empty());

    let url = non_empty_str(&raw["primary_location"]["landing_page_url"]);

    let oa_pdf_url = non_empty_str(&raw["best_oa_location"]["pdf_url"])
        .or_else(|| non_empty_str(&raw["open_access"]["oa_url"]));

    Source {
        id: raw["id"].as_str().unwrap_or_default().to_string(),
        title,
        abstract_text,
        authors: extract_authors(raw),
        year,
        venue,
        doi,
        url,
        oa_pdf_url,
    }
}
