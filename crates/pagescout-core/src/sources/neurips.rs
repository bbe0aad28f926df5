//! NeurIPS proceedings index (papers.nips.cc).
//!
//! No search API exists, so this adapter fetches yearly index pages and
//! filters their paper lists locally. Index pages are large and static;
//! each year is fetched once per process and cached.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::{CandidateRecord, matching::normalize_query};
use super::{SourceAdapter, SourceError, SourceFuture};

const BASE_URL: &str = "https://papers.nips.cc";

/// Proceedings years scanned by default, newest first.
pub const DEFAULT_YEARS: &[u16] = &[2024, 2023, 2022, 2021, 2020, 2019];

/// Minimum fraction of query tokens an index entry must contain to be
/// returned as a candidate. Coarse on purpose; precise scoring happens
/// upstream.
const PREFILTER_COVERAGE: f64 = 0.6;

static PAPER_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul li a").unwrap());

#[derive(Debug)]
pub struct NeuripsAdapter {
    years: Vec<u16>,
    // year -> (title, absolute url) pairs
    index: DashMap<u16, Arc<Vec<(String, String)>>>,
}

impl Default for NeuripsAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_YEARS.to_vec())
    }
}

impl NeuripsAdapter {
    pub fn new(years: Vec<u16>) -> Self {
        Self {
            years,
            index: DashMap::new(),
        }
    }

    async fn year_index(
        &self,
        year: u16,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<Arc<Vec<(String, String)>>, SourceError> {
        if let Some(cached) = self.index.get(&year) {
            return Ok(cached.clone());
        }
        let url = format!("{BASE_URL}/paper_files/paper/{year}");
        let resp = client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        if let Some(err) = SourceError::from_status(&resp) {
            return Err(err);
        }
        let html = resp
            .text()
            .await
            .map_err(SourceError::from_reqwest)?;
        // scraper's DOM is not Send; parse off the async thread.
        let entries = tokio::task::spawn_blocking(move || parse_index(&html))
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let entries = Arc::new(entries);
        self.index.insert(year, entries.clone());
        Ok(entries)
    }
}

impl SourceAdapter for NeuripsAdapter {
    fn name(&self) -> &str {
        "neurips"
    }

    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SourceFuture<'a> {
        Box::pin(async move {
            let query_tokens: HashSet<String> = normalize_query(title)
                .split(' ')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if query_tokens.is_empty() {
                return Ok(vec![]);
            }

            let mut candidates = Vec::new();
            let mut last_err = None;
            for &year in &self.years {
                let entries = match self.year_index(year, client, timeout).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::debug!(year, error = %e, "neurips index fetch failed");
                        last_err = Some(e);
                        continue;
                    }
                };
                for (paper_title, url) in entries.iter() {
                    if prefilter_match(&query_tokens, paper_title) {
                        let mut record = CandidateRecord::bare(paper_title.clone(), "neurips");
                        record.venue = Some("NeurIPS".to_string());
                        record.year = Some(i32::from(year));
                        record.url = Some(url.clone());
                        candidates.push(record);
                    }
                }
                if !candidates.is_empty() {
                    // Papers appear in exactly one proceedings year.
                    break;
                }
            }

            match (candidates.is_empty(), last_err) {
                // Every year failed and nothing matched: surface the error.
                (true, Some(e)) if self.index.is_empty() => Err(e),
                _ => Ok(candidates),
            }
        })
    }
}

fn prefilter_match(query_tokens: &HashSet<String>, paper_title: &str) -> bool {
    let normalized = normalize_query(paper_title);
    let title_tokens: HashSet<&str> = normalized.split(' ').collect();
    let hits = query_tokens
        .iter()
        .filter(|t| title_tokens.contains(t.as_str()))
        .count();
    hits as f64 / query_tokens.len() as f64 >= PREFILTER_COVERAGE
}

fn parse_index(html: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(html);
    doc.select(&PAPER_LINK)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !href.contains("/paper_files/paper/") && !href.contains("/paper/") {
                return None;
            }
            let title = a.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{BASE_URL}{href}")
            };
            Some((title, url))
        })
        .collect()
}
