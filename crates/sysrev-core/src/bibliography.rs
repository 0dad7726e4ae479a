//! Assembly of the final, frozen bibliography.
//!
//! The funnel's survivor list becomes an ordered set of rendered reference
//! strings; each entry's 1-based position is its permanent citation index for
//! the run. Assembly is pure and deterministic — identical survivor lists
//! always produce identical bibliographies.

use serde::Serialize;

use crate::Source;

/// Sentinel used when a source carries no parsable year.
const NO_DATE: &str = "n.d.";

/// One bibliography entry: the source, its rendered reference string and the
/// resolved link (DOI-based canonical URL preferred over the raw locator).
#[derive(Debug, Clone, Serialize)]
pub struct BibEntry {
    pub source: Source,
    pub rendered: String,
    pub link: Option<String>,
}

/// The immutable, ordered bibliography for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bibliography {
    entries: Vec<BibEntry>,
}

impl Bibliography {
    /// Build the bibliography from the funnel's survivor list, order
    /// preserved. The k-th entry (1-based) is always built from the k-th
    /// survivor.
    pub fn assemble(survivors: Vec<Source>) -> Self {
        let entries = survivors
            .into_iter()
            .map(|source| {
                let link = resolve_link(&source);
                let rendered = render_reference(&source, link.as_deref());
                BibEntry {
                    source,
                    rendered,
                    link,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BibEntry] {
        &self.entries
    }

    /// Look up an entry by its 1-based citation index.
    pub fn get(&self, index: usize) -> Option<&BibEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The prompt fragment enumerating every citable index, one
    /// `[k] reference` line per entry.
    pub fn citable_list(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("[{}] {}", i + 1, e.rendered))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// DOI-based canonical URL preferred, else the landing page, else the OA PDF.
fn resolve_link(source: &Source) -> Option<String> {
    if let Some(doi) = source.doi.as_deref().filter(|d| !d.is_empty()) {
        return Some(format!("https://doi.org/{}", doi));
    }
    source
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| source.oa_pdf_url.clone().filter(|u| !u.is_empty()))
}

/// Deterministic reference string: authors, parenthesized year (or the
/// "no date" sentinel), title with one trailing period stripped, venue, link.
fn render_reference(source: &Source, link: Option<&str>) -> String {
    let authors = source.authors.join(", ");
    let year = source
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| NO_DATE.to_string());
    let title = source.title.trim_end_matches('.');

    let mut out = if authors.is_empty() {
        format!("({year}). {title}.")
    } else {
        format!("{authors} ({year}). {title}.")
    };
    if let Some(venue) = source.venue.as_deref().filter(|v| !v.is_empty()) {
        out.push_str(&format!(" {venue}."));
    }
    if let Some(link) = link {
        out.push_str(&format!(" {link}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(title: &str) -> Source {
        Source {
            title: title.into(),
            authors: vec!["Lan Tran".into(), "M. Nguyen".into()],
            year: Some(2019),
            venue: Some("Journal of Cleaner Production".into()),
            doi: Some("10.5555/gg19".into()),
            url: Some("https://example.org/landing".into()),
            ..Default::default()
        }
    }

    #[test]
    fn renders_full_reference_with_doi_link() {
        let bib = Bibliography::assemble(vec![src("Green Growth in Vietnam.")]);
        assert_eq!(
            bib.entries()[0].rendered,
            "Lan Tran, M. Nguyen (2019). Green Growth in Vietnam. \
             Journal of Cleaner Production. https://doi.org/10.5555/gg19"
        );
        assert_eq!(
            bib.entries()[0].link.as_deref(),
            Some("https://doi.org/10.5555/gg19")
        );
    }

    #[test]
    fn missing_year_uses_no_date_sentinel() {
        let mut s = src("Untitled study");
        s.year = None;
        s.authors = vec![];
        s.venue = None;
        s.doi = None;
        s.url = None;
        let bib = Bibliography::assemble(vec![s]);
        assert_eq!(bib.entries()[0].rendered, "(n.d.). Untitled study.");
    }

    #[test]
    fn falls_back_to_raw_url_without_doi() {
        let mut s = src("A");
        s.doi = None;
        let bib = Bibliography::assemble(vec![s]);
        assert_eq!(
            bib.entries()[0].link.as_deref(),
            Some("https://example.org/landing")
        );
    }

    #[test]
    fn index_is_one_based_and_stable() {
        let survivors: Vec<Source> = (0..5).map(|i| src(&format!("Paper {i}"))).collect();
        let bib = Bibliography::assemble(survivors.clone());
        assert_eq!(bib.len(), 5);
        for (i, s) in survivors.iter().enumerate() {
            assert_eq!(bib.get(i + 1).unwrap().source.title, s.title);
        }
        assert!(bib.get(0).is_none());
        assert!(bib.get(6).is_none());
    }

    #[test]
    fn assembly_is_deterministic() {
        let survivors: Vec<Source> = (0..3).map(|i| src(&format!("Paper {i}"))).collect();
        let a = Bibliography::assemble(survivors.clone());
        let b = Bibliography::assemble(survivors);
        for (x, y) in a.entries().iter().zip(b.entries()) {
            assert_eq!(x.rendered, y.rendered);
            assert_eq!(x.link, y.link);
        }
    }

    #[test]
    fn citable_list_enumerates_indices() {
        let bib = Bibliography::assemble(vec![src("A"), src("B")]);
        let list = bib.citable_list();
        assert!(list.starts_with("[1] "));
        assert!(list.contains("\n[2] "));
    }
}
