//! Prompt construction for the generation client.
//!
//! Every per-section prompt embeds the frozen bibliography's citable list;
//! the system instruction pins the academic register and the `[k]` citation
//! convention. The generator may still cite out of range — the citation
//! enforcer is the guarantee, not the prompt.

use crate::bibliography::Bibliography;
use crate::funnel::FunnelCounters;

/// One manuscript section to generate, with a word-count hint.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub title: String,
    pub guidance: String,
    pub words: usize,
}

/// The IMRaD + PRISMA section plan.
pub fn manuscript_sections(section_words: usize) -> Vec<SectionSpec> {
    let section = |title: &str, guidance: &str| SectionSpec {
        title: title.to_string(),
        guidance: guidance.to_string(),
        words: section_words,
    };
    vec![
        section(
            "Introduction",
            "Motivate the topic, state the research gap and the review's objective.",
        ),
        section(
            "Methods",
            "Describe the search strategy, databases, inclusion/exclusion criteria and the screening procedure.",
        ),
        SectionSpec {
            title: "PRISMA Flow".into(),
            guidance: "Narrate the screening funnel stage by stage using the counts provided."
                .into(),
            words: section_words / 2,
        },
        section(
            "Results",
            "Synthesize the included studies: themes, trends over time, notable clusters.",
        ),
        section(
            "Discussion",
            "Interpret the findings, compare with prior work, note policy and practice implications.",
        ),
        SectionSpec {
            title: "Conclusion".into(),
            guidance: "State the main takeaways plainly.".into(),
            words: section_words / 2,
        },
        SectionSpec {
            title: "Limitations".into(),
            guidance: "Name the concrete limitations of the search and screening approach.".into(),
            words: section_words / 2,
        },
    ]
}

/// System instruction shared by every section call.
pub fn system_instruction() -> String {
    "You are an academic writing assistant drafting sections of a systematic \
     review manuscript. Write in a formal, objective register. Cite evidence \
     only with bracketed numeric markers like [3] that refer to the numbered \
     reference list provided in the prompt; never cite any number outside \
     that list and never invent references. Return plain prose without code \
     fences, headings or YAML."
        .to_string()
}

/// Build the user prompt for one section.
pub fn section_prompt(
    section: &SectionSpec,
    topic: &str,
    counters: &FunnelCounters,
    bibliography: &Bibliography,
) -> String {
    format!(
        "Topic of the review: {topic}\n\
         \n\
         Screening funnel counts: {initial} records retrieved, {deduped} after \
         de-duplication and validity checks, {title} after title screening, \
         {abs} after abstract screening, {included} included.\n\
         \n\
         Numbered references (the only citable sources):\n{refs}\n\
         \n\
         Write the \"{name}\" section (about {words} words). {guidance} \
         Cite only the numbered references above using [k] markers.",
        topic = topic,
        initial = counters.initial,
        deduped = counters.deduped,
        title = counters.screened_title,
        abs = counters.screened_abstract,
        included = counters.included_fulltext,
        refs = bibliography.citable_list(),
        name = section.title,
        words = section.words,
        guidance = section.guidance,
    )
}

/// Remove ``` fencing the model occasionally wraps its output in.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if let Some(pos) = lines.iter().position(|l| l.trim_start().starts_with("```")) {
        lines.truncate(pos);
    }
    lines.join("\n").trim().to_string()
}
