//! Generic free-text scan of the landing page.
//!
//! Last resort before the LLM: strip the page to text and look for
//! labelled ranges (`pp. 123-145`, `Pages: 123-145`) before falling back
//! to bare `123-145` pairs.

use std::time::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::PageRange;
use super::{ExtractionContext, ExtractionOutcome, FetchError, PageStrategy, StrategyFuture, html_to_text};

static LABELLED: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bpp\.?\s*(\d{1,6})\s*[-\u{2013}\u{2014}]{1,2}\s*(\d{1,6})").unwrap(),
        Regex::new(r"(?i)\bpages?\s*:?\s*(\d{1,6})\s*[-\u{2013}\u{2014}]{1,2}\s*(\d{1,6})").unwrap(),
    ]
});
static BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,6})\s*[-\u{2013}\u{2014}]\s*(\d{1,6})\b").unwrap());

#[derive(Debug, Default)]
pub struct ContentScan;

impl PageStrategy for ContentScan {
    fn name(&self) -> &str {
        "content_scan"
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a mut ExtractionContext,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            let Some(url) = ctx.record.url.clone() else {
                return ExtractionOutcome::NoData;
            };
            let html = match ctx.fetch(&url, client, timeout).await {
                Ok(html) => html.to_string(),
                Err(FetchError::Protected) => return ExtractionOutcome::NoData,
                Err(e) => return ExtractionOutcome::Error(format!("fetch {url}: {e}")),
            };
            let text = html_to_text(&html);
            match scan_text(&text) {
                Some(pages) => ExtractionOutcome::Pages(pages),
                None => ExtractionOutcome::NoData,
            }
        })
    }
}

fn scan_text(text: &str) -> Option<PageRange> {
    for re in LABELLED.iter() {
        for caps in re.captures_iter(text) {
            if let Some(pages) = range_from_caps(&caps) {
                return Some(pages);
            }
        }
    }
    BARE.captures_iter(text).find_map(|caps| {
        let pages = range_from_caps(&caps)?;
        // Unlabelled pairs are ambiguous; skip anything that looks like a
        // year span ("2019-2020") or spans no article could have
        // (ISSNs, id ranges).
        if looks_like_year_span(&pages) || too_wide(&pages) {
            return None;
        }
        Some(pages)
    })
}

fn too_wide(pages: &PageRange) -> bool {
    pages
        .end()
        .is_some_and(|end| end - pages.start() > 1_000)
}

fn range_from_caps(caps: &regex::Captures<'_>) -> Option<PageRange> {
    let start: u32 = caps.get(1)?.as_str().parse().ok()?;
    let end: u32 = caps.get(2)?.as_str().parse().ok()?;
    PageRange::span(start, end)
}

fn looks_like_year_span(pages: &PageRange) -> bool {
    let is_year = |n: u32| (1800..=2100).contains(&n);
    is_year(pages.start()) && pages.end().is_some_and(is_year)
}
