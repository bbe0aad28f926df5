//! Page-number extraction strategies.
//!
//! When the accepted record arrives without a page range, the chain runs
//! orderly through its strategies, cheapest first, and stops at the first
//! one that yields a valid range. A strategy distinguishes "nothing
//! there" ([`ExtractionOutcome::NoData`]) from "could not look"
//! ([`ExtractionOutcome::Error`]); both move the chain along, but errors
//! are logged at a visible level.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{CandidateRecord, Config, PageRange};

pub mod content_scan;
pub mod document_meta;
pub mod doi_lookup;
pub mod llm;
pub mod mock;
pub mod structured;
pub mod venue_page;

pub use content_scan::ContentScan;
pub use document_meta::DocumentMeta;
pub use doi_lookup::DoiLookup;
pub use llm::LlmPageExtractor;
pub use mock::MockStrategy;
pub use structured::StructuredCitation;
pub use venue_page::VenuePage;

/// Result of one strategy's attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// A validated page range. Stops the chain.
    Pages(PageRange),
    /// The strategy ran but the data simply is not there.
    NoData,
    /// The strategy could not complete (network, parse, auth).
    Error(String),
}

/// Why a page fetch did not produce content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Domain known to sit behind anti-bot protection; not worth a request.
    Protected,
    Failed(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Protected => write!(f, "protected domain"),
            FetchError::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

/// Publisher domains that block plain HTTP clients. Fetching them wastes
/// a request and pollutes logs with 403s.
const PROTECTED_DOMAINS: &[&str] = &[
    "sciencedirect.com",
    "ieeexplore.ieee.org",
    "dl.acm.org",
    "link.springer.com",
    "onlinelibrary.wiley.com",
    "tandfonline.com",
];

struct FetchedPage {
    url: String,
    html: String,
}

/// Mutable state threaded through the chain for one record.
///
/// The fetched landing page is kept here so later strategies (content
/// scan, LLM) reuse it instead of re-downloading.
pub struct ExtractionContext {
    pub record: CandidateRecord,
    fetched: Option<FetchedPage>,
}

impl ExtractionContext {
    pub fn new(record: CandidateRecord) -> Self {
        Self {
            record,
            fetched: None,
        }
    }

    /// HTML of the record's landing page, if some strategy fetched it.
    pub fn fetched_html(&self) -> Option<&str> {
        self.fetched.as_ref().map(|f| f.html.as_str())
    }

    /// Fetch `url`, reusing the cached copy when it is the same page.
    pub async fn fetch(
        &mut self,
        url: &str,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<&str, FetchError> {
        let cached = self.fetched.as_ref().is_some_and(|f| f.url == url);
        if !cached {
            if PROTECTED_DOMAINS.iter().any(|d| url.contains(d)) {
                return Err(FetchError::Protected);
            }
            let resp = client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| FetchError::Failed(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(FetchError::Failed(format!("status {}", resp.status())));
            }
            let html = resp
                .text()
                .await
                .map_err(|e| FetchError::Failed(e.to_string()))?;
            self.fetched = Some(FetchedPage {
                url: url.to_string(),
                html,
            });
        }
        self.fetched
            .as_ref()
            .map(|f| f.html.as_str())
            .ok_or_else(|| FetchError::Failed("no content".to_string()))
    }
}

pub type StrategyFuture<'a> = Pin<Box<dyn Future<Output = ExtractionOutcome> + Send + 'a>>;

/// One way of finding a page range for a record.
pub trait PageStrategy: Send + Sync {
    /// Stable identifier, recorded on the resolved paper as `pages_source`.
    fn name(&self) -> &str;

    fn attempt<'a>(
        &'a self,
        ctx: &'a mut ExtractionContext,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> StrategyFuture<'a>;
}

/// An ordered sequence of strategies with first-valid-result-wins
/// semantics.
pub struct ExtractionChain {
    strategies: Vec<Arc<dyn PageStrategy>>,
    timeout: Duration,
}

impl ExtractionChain {
    /// The standard chain: structured payload, DOI negotiation, document
    /// metadata, venue-specific parsing, free-text scan, and optionally
    /// the LLM fallback when it is enabled and usable.
    pub fn from_config(config: &Config) -> Self {
        let mut strategies: Vec<Arc<dyn PageStrategy>> = vec![
            Arc::new(StructuredCitation),
            Arc::new(DoiLookup),
            Arc::new(DocumentMeta),
            Arc::new(VenuePage),
            Arc::new(ContentScan),
        ];
        if config.llm.enabled {
            match LlmPageExtractor::from_config(&config.llm) {
                Ok(llm) => strategies.push(Arc::new(llm)),
                Err(e) => {
                    // Logged once here, not per paper.
                    tracing::warn!(error = %e, "llm extraction disabled");
                }
            }
        }
        Self {
            strategies,
            timeout: Duration::from_secs(config.extract_timeout_secs),
        }
    }

    pub fn with_strategies(strategies: Vec<Arc<dyn PageStrategy>>, timeout: Duration) -> Self {
        Self { strategies, timeout }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain for `record`. Returns the page range and the name of
    /// the strategy that produced it, or `None` when every strategy came
    /// up empty.
    pub async fn extract(
        &self,
        record: &CandidateRecord,
        client: &reqwest::Client,
    ) -> Option<(PageRange, String)> {
        let mut ctx = ExtractionContext::new(record.clone());
        for strategy in &self.strategies {
            match strategy.attempt(&mut ctx, client, self.timeout).await {
                ExtractionOutcome::Pages(pages) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        pages = %pages,
                        title = %record.title,
                        "extracted page range"
                    );
                    return Some((pages, strategy.name().to_string()));
                }
                ExtractionOutcome::NoData => {
                    tracing::trace!(strategy = strategy.name(), "no page data");
                }
                ExtractionOutcome::Error(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "extraction failed");
                }
            }
        }
        None
    }
}

static BIBTEX_PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)pages\s*=\s*[{"]([^}"]+)[}"]"#).unwrap());

/// Pull the `pages = {...}` field out of a BibTeX entry.
pub(crate) fn bibtex_pages(bibtex: &str) -> Option<PageRange> {
    BIBTEX_PAGES
        .captures(bibtex)
        .and_then(|c| c.get(1))
        .and_then(|m| PageRange::parse(m.as_str()))
}

static TAG_BLOCKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reduce an HTML document to whitespace-collapsed visible text.
pub(crate) fn html_to_text(html: &str) -> String {
    let without_blocks = TAG_BLOCKS.replace_all(html, " ");
    let without_tags = TAGS.replace_all(&without_blocks, " ");
    WS.replace_all(without_tags.trim(), " ").into_owned()
}
