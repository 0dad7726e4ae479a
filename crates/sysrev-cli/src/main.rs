use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sysrev_core::generate::GeminiBackend;
use sysrev_core::pipeline::{self, PipelineError, RunConfig};
use sysrev_core::{RetrievalCache, config_file};

mod output;

/// Generate pseudo-systematic-review manuscripts with verified citations
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write a Markdown manuscript
    Generate {
        /// Review topic (free text)
        topic: String,

        /// Inclusive publication year range, e.g. 2015-2024
        #[arg(long)]
        years: Option<String>,

        /// Synonym terms ORed into the search
        #[arg(long, value_delimiter = ',')]
        synonyms: Vec<String>,

        /// Records per page
        #[arg(long)]
        per_page: Option<u32>,

        /// Hard upper bound on result pages fetched
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum number of included sources
        #[arg(long)]
        max_sources: Option<usize>,

        /// Verify DOIs against the live resolver instead of accepting any
        /// non-empty DOI
        #[arg(long)]
        verify_doi: bool,

        /// Generation model identifier
        #[arg(long)]
        model: Option<String>,

        /// Gemini API key (falls back to GEMINI_API_KEY)
        #[arg(long)]
        gemini_key: Option<String>,

        /// Path for the Markdown manuscript (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after screening: print the funnel and references, skip
        /// generation
        #[arg(long)]
        dry_run: bool,
    },

    /// Retrieve and screen only, printing the funnel and the reference list
    Search {
        /// Review topic (free text)
        topic: String,

        /// Inclusive publication year range, e.g. 2015-2024
        #[arg(long)]
        years: Option<String>,

        /// Records per page
        #[arg(long)]
        per_page: Option<u32>,

        /// Hard upper bound on result pages fetched
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum number of included sources
        #[arg(long)]
        max_sources: Option<usize>,

        /// Verify DOIs against the live resolver
        #[arg(long)]
        verify_doi: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            topic,
            years,
            synonyms,
            per_page,
            max_pages,
            max_sources,
            verify_doi,
            model,
            gemini_key,
            output,
            dry_run,
        } => {
            let file_config = config_file::load_config();
            let config = build_run_config(
                &file_config,
                topic,
                years,
                synonyms,
                per_page,
                max_pages,
                max_sources,
                verify_doi,
            );

            if dry_run {
                return search(config).await;
            }

            let gemini_key = gemini_key
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .or_else(|| {
                    file_config
                        .api_keys
                        .as_ref()
                        .and_then(|k| k.gemini_key.clone())
                });
            let Some(gemini_key) = gemini_key else {
                anyhow::bail!(
                    "No Gemini API key. Pass --gemini-key, set GEMINI_API_KEY, or add it to the config file."
                );
            };
            let model = model
                .or_else(|| {
                    file_config
                        .generation
                        .as_ref()
                        .and_then(|g| g.model.clone())
                })
                .unwrap_or_else(|| "gemini-1.5-pro".to_string());

            generate(config, gemini_key, model, output).await
        }
        Command::Search {
            topic,
            years,
            per_page,
            max_pages,
            max_sources,
            verify_doi,
        } => {
            let file_config = config_file::load_config();
            let config = build_run_config(
                &file_config,
                topic,
                years,
                vec![],
                per_page,
                max_pages,
                max_sources,
                verify_doi,
            );
            search(config).await
        }
    }
}

/// Resolve configuration: CLI flags > config file > defaults.
#[allow(clippy::too_many_arguments)]
fn build_run_config(
    file_config: &config_file::ConfigFile,
    topic: String,
    years: Option<String>,
    synonyms: Vec<String>,
    per_page: Option<u32>,
    max_pages: Option<u32>,
    max_sources: Option<usize>,
    verify_doi: bool,
) -> RunConfig {
    let defaults = RunConfig::default();
    let search = file_config.search.clone().unwrap_or_default();
    let generation = file_config.generation.clone().unwrap_or_default();

    let synonyms = if synonyms.is_empty() {
        search.synonyms.unwrap_or_default()
    } else {
        synonyms
    };

    RunConfig {
        topic,
        synonyms,
        year_range: years,
        per_page: per_page.or(search.per_page).unwrap_or(defaults.per_page),
        max_pages: max_pages.or(search.max_pages).unwrap_or(defaults.max_pages),
        max_sources: max_sources
            .or(search.max_sources)
            .unwrap_or(defaults.max_sources),
        verify_doi: verify_doi || search.verify_doi.unwrap_or(false),
        section_words: generation
            .section_words
            .unwrap_or(defaults.section_words),
        temperature: generation.temperature.unwrap_or(defaults.temperature),
        max_output_tokens: generation
            .max_output_tokens
            .unwrap_or(defaults.max_output_tokens),
        request_timeout_secs: generation
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
        retry: defaults.retry,
    }
}

async fn generate(
    config: RunConfig,
    gemini_key: String,
    model: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let cache = RetrievalCache::new();
    let backend = GeminiBackend {
        api_key: gemini_key,
        model,
    };

    let report = match pipeline::run(&config, &backend, &client, Some(&cache)).await {
        Ok(report) => report,
        Err(PipelineError::NoQualifyingSources { counters }) => {
            eprintln!("No qualifying sources found for this topic and year range.");
            eprintln!("{}", output::render_funnel(&counters));
            std::process::exit(2);
        }
    };

    for failure in &report.failures {
        tracing::warn!(section = %failure.title, error = %failure.error, "section missing from manuscript");
    }

    let markdown = output::render_markdown(&report);
    match output {
        Some(path) => {
            std::fs::write(&path, markdown)?;
            println!("Wrote {}", path.display());
        }
        None => {
            std::io::stdout().write_all(markdown.as_bytes())?;
        }
    }
    Ok(())
}

async fn search(config: RunConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let (survivors, counters) = pipeline::screen(&config, &client, None).await;

    println!("{}", output::render_funnel(&counters));
    if survivors.is_empty() {
        eprintln!("No qualifying sources found for this topic and year range.");
        std::process::exit(2);
    }
    println!("{}", output::render_survivors(&survivors));
    Ok(())
}
