//! Markdown rendering of a pipeline report.
//!
//! This is the downstream-renderer seam: it consumes the funnel counters,
//! the frozen bibliography and the enforced prose, and embeds them into a
//! plain Markdown manuscript. Nothing here feeds back into the pipeline.

use sysrev_core::{FunnelCounters, Report, Source};

/// Render the full manuscript as Markdown.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# {}: A Systematic Review\n\n",
        capitalize(&report.topic)
    ));

    out.push_str("## Screening Summary (PRISMA)\n\n");
    out.push_str(&render_funnel(&report.counters));
    out.push('\n');

    for section in &report.sections {
        out.push_str(&format!("## {}\n\n{}\n\n", section.title, section.text));
    }

    if !report.failures.is_empty() {
        out.push_str("## Generation Notes\n\n");
        for failure in &report.failures {
            out.push_str(&format!(
                "- Section \"{}\" could not be generated: {}\n",
                failure.title, failure.error
            ));
        }
        out.push('\n');
    }

    out.push_str("## References\n\n");
    out.push_str(&render_references(report));
    out
}

/// The funnel table alone, used by `search` / dry runs.
pub fn render_funnel(counters: &FunnelCounters) -> String {
    format!(
        "| Stage | Records |\n\
         |---|---|\n\
         | Retrieved | {} |\n\
         | After de-duplication and validity checks | {} |\n\
         | After title screening | {} |\n\
         | After abstract screening | {} |\n\
         | Included | {} |\n",
        counters.initial,
        counters.deduped,
        counters.screened_title,
        counters.screened_abstract,
        counters.included_fulltext,
    )
}

/// Numbered reference list, one entry per line.
pub fn render_references(report: &Report) -> String {
    report
        .bibliography
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}\n", i + 1, e.rendered))
        .collect()
}

/// Reference list straight from a survivor list (dry runs assemble their own
/// bibliography for display).
pub fn render_survivors(survivors: &[Source]) -> String {
    sysrev_core::Bibliography::assemble(survivors.to_vec())
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}\n", i + 1, e.rendered))
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
