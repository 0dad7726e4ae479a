//! On-disk TOML configuration.
//!
//! All fields are optional so partial configs work: the platform config file
//! is overlaid by a `.sysrev.toml` in the working directory, and anything
//! still unset falls back to [`RunConfig`](crate::RunConfig) defaults at the
//! call site.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub search: Option<SearchConfig>,
    pub generation: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub gemini_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub per_page: Option<u32>,
    pub max_pages: Option<u32>,
    pub max_sources: Option<usize>,
    pub verify_doi: Option<bool>,
    pub synonyms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub section_words: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/sysrev/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sysrev").join("config.toml"))
}

/// Load config by cascading CWD `.sysrev.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".sysrev.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let b_keys = base.api_keys.unwrap_or_default();
    let o_keys = overlay.api_keys.unwrap_or_default();
    let b_search = base.search.unwrap_or_default();
    let o_search = overlay.search.unwrap_or_default();
    let b_gen = base.generation.unwrap_or_default();
    let o_gen = overlay.generation.unwrap_or_default();

    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            gemini_key: o_keys.gemini_key.or(b_keys.gemini_key),
        }),
        search: Some(SearchConfig {
            per_page: o_search.per_page.or(b_search.per_page),
            max_pages: o_search.max_pages.or(b_search.max_pages),
            max_sources: o_search.max_sources.or(b_search.max_sources),
            verify_doi: o_search.verify_doi.or(b_search.verify_doi),
            synonyms: o_search.synonyms.or(b_search.synonyms),
        }),
        generation: Some(GenerationConfig {
            model: o_gen.model.or(b_gen.model),
            temperature: o_gen.temperature.or(b_gen.temperature),
            max_output_tokens: o_gen.max_output_tokens.or(b_gen.max_output_tokens),
            section_words: o_gen.section_words.or(b_gen.section_words),
            request_timeout_secs: o_gen.request_timeout_secs.or(b_gen.request_timeout_secs),
        }),
    }
}
