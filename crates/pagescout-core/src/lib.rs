use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod cite;
pub mod config_file;
pub mod extract;
pub mod matching;
pub mod orchestrator;
pub mod pages;
pub mod rate_limit;
pub mod sources;
pub mod venues;

// Re-export for convenience
pub use cache::{DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_TTL, CacheStats, ResolutionCache};
pub use matching::{MatchScorer, normalize_query};
pub use orchestrator::{Resolution, Resolver};
pub use pages::PageRange;
pub use rate_limit::RateLimiters;
pub use sources::{SourceAdapter, SourceError};

/// A bibliographic record produced by one source adapter.
///
/// Immutable once returned by [`SourceAdapter::search`]; the orchestrator
/// never patches fields across adapters (first-source-wins, no merging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub pages: Option<PageRange>,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    /// Name of the adapter that produced this record (e.g. "dblp").
    pub source: String,
    /// The adapter's raw payload for this record, kept for the structured
    /// extraction strategy.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl CandidateRecord {
    /// A record carrying only a title and source, everything else absent.
    pub fn bare(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: vec![],
            year: None,
            venue: None,
            pages: None,
            url: None,
            doi: None,
            volume: None,
            issue: None,
            source: source.into(),
            raw: serde_json::Value::Null,
        }
    }
}

/// A candidate together with its similarity score against the query.
/// Lives only within one orchestration call.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub score: f64,
    pub accepted: bool,
    /// Position in the adapter's result list (tie-break input).
    pub position: usize,
}

/// The accepted candidate, with pages possibly filled in by the
/// extraction chain. This is what the cache persists and callers consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPaper {
    #[serde(flatten)]
    pub record: CandidateRecord,
    /// Which extraction strategy produced the page range, when it was not
    /// already present on the adapter's record.
    pub pages_source: Option<String>,
}

impl ResolvedPaper {
    pub fn from_candidate(record: CandidateRecord) -> Self {
        Self {
            record,
            pages_source: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Configuration for the LLM-assisted page extraction strategy.
///
/// The endpoint is any chat-completion-style API; `base_url` points at the
/// API root (the client appends `/chat/completions`).
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            // Low temperature: we want extraction, not creativity.
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for the resolution pipeline.
///
/// Constructed once at process start and handed to [`Resolver::new`];
/// no component reads configuration from globals.
#[derive(Clone)]
pub struct Config {
    pub s2_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    /// Adapter priority order; the first adapter with an acceptable match wins.
    pub source_order: Vec<String>,
    pub disabled_sources: Vec<String>,
    /// Minimum similarity for a candidate to be accepted (inclusive).
    pub accept_threshold: f64,
    pub source_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub rate_limiters: Arc<RateLimiters>,
    pub llm: LlmConfig,
    /// Shared cache; a fresh in-memory cache is built when absent.
    pub cache: Option<Arc<ResolutionCache>>,
    /// Path to the persistent SQLite cache database (optional).
    pub cache_path: Option<PathBuf>,
    /// TTL in seconds for resolved entries. Default: 30 days.
    pub cache_positive_ttl_secs: u64,
    /// TTL in seconds for not-found markers. Default: 24 hours.
    pub cache_negative_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            s2_api_key: None,
            crossref_mailto: None,
            source_order: default_source_order(),
            disabled_sources: vec![],
            accept_threshold: matching::DEFAULT_ACCEPT_THRESHOLD,
            source_timeout_secs: 10,
            extract_timeout_secs: 10,
            rate_limiters: Arc::new(RateLimiters::default()),
            llm: LlmConfig::default(),
            cache: None,
            cache_path: None,
            cache_positive_ttl_secs: DEFAULT_POSITIVE_TTL.as_secs(),
            cache_negative_ttl_secs: DEFAULT_NEGATIVE_TTL.as_secs(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("s2_api_key", &self.s2_api_key.as_ref().map(|_| "***"))
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field("source_order", &self.source_order)
            .field("disabled_sources", &self.disabled_sources)
            .field("accept_threshold", &self.accept_threshold)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("llm", &self.llm)
            .field("cache", &self.cache.as_ref().map(|c| format!("{:?}", c)))
            .field("cache_path", &self.cache_path)
            .field("cache_positive_ttl_secs", &self.cache_positive_ttl_secs)
            .field("cache_negative_ttl_secs", &self.cache_negative_ttl_secs)
            .finish()
    }
}

/// Default adapter priority: bibliographic index first (most precise for
/// CS venues), then the citation graph, the cross-publisher registry, and
/// the proceedings index last (slowest, scraped).
pub fn default_source_order() -> Vec<String> {
    vec![
        "dblp".to_string(),
        "semantic_scholar".to_string(),
        "crossref".to_string(),
        "neurips".to_string(),
    ]
}

/// Build a [`ResolutionCache`] from configuration.
///
/// If `cache_path` is set, opens a persistent SQLite-backed cache;
/// otherwise returns an in-memory-only cache.
pub fn build_resolution_cache(
    cache_path: Option<&std::path::Path>,
    positive_ttl_secs: u64,
    negative_ttl_secs: u64,
) -> Arc<ResolutionCache> {
    let positive_ttl = Duration::from_secs(positive_ttl_secs);
    let negative_ttl = Duration::from_secs(negative_ttl_secs);
    if let Some(path) = cache_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match ResolutionCache::open(path, positive_ttl, negative_ttl) {
            Ok(cache) => {
                tracing::info!(path = %path.display(), "opened persistent resolution cache");
                return Arc::new(cache);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open cache, falling back to in-memory");
            }
        }
    }
    Arc::new(ResolutionCache::new(positive_ttl, negative_ttl))
}

#[cfg(test)]
mod build_cache_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!(
                "pagescout_build_cache_test_{}_{}",
                std::process::id(),
                id,
            ))
            .join("cache.db")
    }

    #[test]
    fn none_path_returns_in_memory() {
        let cache = build_resolution_cache(
            None,
            DEFAULT_POSITIVE_TTL.as_secs(),
            DEFAULT_NEGATIVE_TTL.as_secs(),
        );
        assert!(!cache.has_persistence());
    }

    #[test]
    fn valid_path_returns_persistent() {
        let path = temp_path();
        let _ = std::fs::remove_file(&path);

        let cache = build_resolution_cache(
            Some(&path),
            DEFAULT_POSITIVE_TTL.as_secs(),
            DEFAULT_NEGATIVE_TTL.as_secs(),
        );
        assert!(cache.has_persistence());

        // 30 days positive, 24 hours negative
        assert_eq!(
            cache.positive_ttl(),
            Duration::from_secs(30 * 24 * 60 * 60)
        );
        assert_eq!(cache.negative_ttl(), Duration::from_secs(24 * 60 * 60));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn creates_parent_directory() {
        let path = temp_path();
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let cache = build_resolution_cache(
            Some(&path),
            DEFAULT_POSITIVE_TTL.as_secs(),
            DEFAULT_NEGATIVE_TTL.as_secs(),
        );
        assert!(cache.has_persistence());
        assert!(path.parent().unwrap().exists());

        let _ = std::fs::remove_file(&path);
    }
}
