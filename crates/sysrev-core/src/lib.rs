use serde::Serialize;

pub mod bibliography;
pub mod citations;
pub mod config_file;
pub mod funnel;
pub mod generate;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod retry;
pub mod validity;

// Re-export for convenience
pub use bibliography::{BibEntry, Bibliography};
pub use citations::enforce_citations;
pub use funnel::FunnelCounters;
pub use generate::{GenerateError, GenerationBackend, GenerationRequest};
pub use pipeline::{PipelineError, Report, RunConfig, SectionFailure};
pub use retrieve::RetrievalCache;
pub use retry::RetryPolicy;

/// One bibliographic candidate, normalized from a remote search record.
///
/// The loosely-typed remote payload never leaks past
/// [`normalize::normalize_record`]; everything downstream works on this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    /// Opaque external identifier, display only.
    pub id: String,
    /// Whitespace-collapsed title. The case-insensitive dedup key.
    pub title: String,
    /// Reconstructed abstract, if the record carried one.
    pub abstract_text: Option<String>,
    /// Author display names in publication order.
    pub authors: Vec<String>,
    /// Publication year, absent when unparsable.
    pub year: Option<i32>,
    /// Publishing venue display name.
    pub venue: Option<String>,
    /// DOI with scheme/host prefix stripped.
    pub doi: Option<String>,
    /// Landing page URL.
    pub url: Option<String>,
    /// Open-access PDF URL.
    pub oa_pdf_url: Option<String>,
}

impl Source {
    /// Whether the source carries any usable locator besides a DOI.
    pub fn has_locator(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
            || self.oa_pdf_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// A generated prose section after citation enforcement.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSection {
    pub title: String,
    pub text: String,
}
