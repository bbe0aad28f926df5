//! Resolution orchestration.
//!
//! One resolution walks the cache, then the sources in priority order.
//! The first source producing a candidate that clears the similarity
//! threshold wins outright; later sources are never consulted, and
//! records from different sources are never merged. Missing pages are
//! filled by the extraction chain before the outcome, found or not, is
//! written back to the cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cache::ResolutionCache;
use crate::extract::ExtractionChain;
use crate::matching::MatchScorer;
use crate::sources::{
    CrossrefAdapter, DblpAdapter, NeuripsAdapter, SemanticScholarAdapter, SourceAdapter,
    SourceError,
};
use crate::{Config, CoreError, ResolvedPaper, build_resolution_cache};

const USER_AGENT: &str = concat!("pagescout/", env!("CARGO_PKG_VERSION"));

/// Outcome of one resolution. `NotFound` is a first-class result: it is
/// cached (with the shorter TTL) and reported, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    Resolved(ResolvedPaper),
    NotFound,
}

pub struct Resolver {
    config: Config,
    scorer: MatchScorer,
    sources: Vec<Arc<dyn SourceAdapter>>,
    chain: ExtractionChain,
    cache: Arc<ResolutionCache>,
    client: reqwest::Client,
}

impl Resolver {
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let sources = build_sources(&config)?;
        let chain = ExtractionChain::from_config(&config);
        Self::assemble(config, sources, chain)
    }

    /// Resolver over caller-supplied adapters, standard extraction chain.
    pub fn with_sources(
        config: Config,
        sources: Vec<Arc<dyn SourceAdapter>>,
    ) -> Result<Self, CoreError> {
        let chain = ExtractionChain::from_config(&config);
        Self::assemble(config, sources, chain)
    }

    /// Full control over adapters and chain.
    pub fn with_parts(
        config: Config,
        sources: Vec<Arc<dyn SourceAdapter>>,
        chain: ExtractionChain,
    ) -> Result<Self, CoreError> {
        Self::assemble(config, sources, chain)
    }

    fn assemble(
        config: Config,
        sources: Vec<Arc<dyn SourceAdapter>>,
        chain: ExtractionChain,
    ) -> Result<Self, CoreError> {
        if sources.is_empty() {
            return Err(CoreError::Config("no sources enabled".to_string()));
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        let cache = config.cache.clone().unwrap_or_else(|| {
            build_resolution_cache(
                config.cache_path.as_deref(),
                config.cache_positive_ttl_secs,
                config.cache_negative_ttl_secs,
            )
        });
        let scorer = MatchScorer::new(config.accept_threshold);
        Ok(Self {
            config,
            scorer,
            sources,
            chain,
            cache,
            client,
        })
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve a paper title.
    ///
    /// `use_cache` gates reads only; the outcome is always written back,
    /// so a `--no-cache` run still refreshes the stored entry.
    pub async fn resolve(&self, title: &str, use_cache: bool) -> Resolution {
        if use_cache {
            if let Some(resolution) = self.cache.get(title) {
                tracing::debug!(title, "cache hit");
                return resolution;
            }
        }
        let resolution = self.resolve_uncached(title).await;
        self.cache.put(title, &resolution);
        resolution
    }

    async fn resolve_uncached(&self, title: &str) -> Resolution {
        let timeout = Duration::from_secs(self.config.source_timeout_secs);
        for source in &self.sources {
            let name = source.name();
            self.config.rate_limiters.acquire(name).await;

            let candidates = match source.search(title, &self.client, timeout).await {
                Ok(candidates) => {
                    self.config.rate_limiters.on_success(name);
                    candidates
                }
                Err(e @ SourceError::RateLimited { .. }) => {
                    self.config.rate_limiters.on_rate_limited(name);
                    tracing::warn!(source = name, error = %e, "source rate limited");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(source = name, error = %e, "source lookup failed");
                    continue;
                }
            };
            if candidates.is_empty() {
                tracing::debug!(source = name, "no candidates");
                continue;
            }

            let Some(best) = self.scorer.pick_best(title, &candidates) else {
                tracing::debug!(
                    source = name,
                    candidates = candidates.len(),
                    "no candidate met the threshold"
                );
                continue;
            };
            tracing::info!(
                source = name,
                score = best.score,
                matched = %best.record.title,
                "accepted match"
            );

            let mut paper = ResolvedPaper::from_candidate(best.record);
            if paper.record.pages.is_none() {
                if let Some((pages, strategy)) =
                    self.chain.extract(&paper.record, &self.client).await
                {
                    paper.record.pages = Some(pages);
                    paper.pages_source = Some(strategy);
                }
            }
            return Resolution::Resolved(paper);
        }
        tracing::info!(title, "no source produced a match");
        Resolution::NotFound
    }

    /// Resolve several titles sequentially. When `cancel` fires the title
    /// already in flight runs to completion (and lands in the cache); no
    /// further titles are started. Titles not reached are absent from the
    /// result.
    pub async fn resolve_batch(
        &self,
        titles: &[String],
        use_cache: bool,
        cancel: CancellationToken,
    ) -> Vec<(String, Resolution)> {
        let mut results = Vec::with_capacity(titles.len());
        for title in titles {
            if cancel.is_cancelled() {
                break;
            }
            let resolution = self.resolve(title, use_cache).await;
            results.push((title.clone(), resolution));
        }
        results
    }
}

fn build_sources(config: &Config) -> Result<Vec<Arc<dyn SourceAdapter>>, CoreError> {
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for name in &config.source_order {
        if config.disabled_sources.iter().any(|d| d == name) {
            continue;
        }
        let adapter: Arc<dyn SourceAdapter> = match name.as_str() {
            "dblp" => Arc::new(DblpAdapter),
            "semantic_scholar" => {
                Arc::new(SemanticScholarAdapter::new(config.s2_api_key.clone()))
            }
            "crossref" => Arc::new(CrossrefAdapter::new(config.crossref_mailto.clone())),
            "neurips" => Arc::new(NeuripsAdapter::default()),
            other => {
                return Err(CoreError::Config(format!("unknown source: {other}")));
            }
        };
        sources.push(adapter);
    }
    Ok(sources)
}
