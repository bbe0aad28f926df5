//! Venue-specific page parsing.
//!
//! A few venues deserve bespoke handling: dblp record pages carry a
//! pagination span, PMLR abstract pages embed their BibTeX inline, and
//! NeurIPS abstract pages link to a BibTeX file. Everything else falls
//! through to the generic strategies.

use std::time::Duration;
use scraper::{Html, Selector};

use crate::PageRange;
use super::{ExtractionContext, ExtractionOutcome, FetchError, PageStrategy, StrategyFuture, bibtex_pages};

#[derive(Debug, Default)]
pub struct VenuePage;

enum Venue {
    Dblp,
    Pmlr,
    Neurips,
}

fn classify(url: &str) -> Option<Venue> {
    if url.contains("dblp.org") {
        Some(Venue::Dblp)
    } else if url.contains("proceedings.mlr.press") {
        Some(Venue::Pmlr)
    } else if url.contains("nips.cc") || url.contains("neurips.cc") {
        Some(Venue::Neurips)
    } else {
        None
    }
}

impl PageStrategy for VenuePage {
    fn name(&self) -> &str {
        "venue_page"
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
            let Some(venue) = classify(&url) else {
                return ExtractionOutcome::NoData;
            };
            let html = match ctx.fetch(&url, client, timeout).await {
                Ok(html) => html.to_string(),
                Err(FetchError::Protected) => return ExtractionOutcome::NoData,
                Err(e) => return ExtractionOutcome::Error(format!("fetch {url}: {e}")),
            };
            match venue {
                Venue::Dblp => match dblp_pagination(&html) {
                    Some(pages) => ExtractionOutcome::Pages(pages),
                    None => ExtractionOutcome::NoData,
                },
                // PMLR embeds the full BibTeX entry in the abstract page.
                Venue::Pmlr => match bibtex_pages(&html) {
                    Some(pages) => ExtractionOutcome::Pages(pages),
                    None => ExtractionOutcome::NoData,
                },
                Venue::Neurips => {
                    let Some(bib_url) = bibtex_link(&html, &url) else {
                        return ExtractionOutcome::NoData;
                    };
                    let bibtex = match client.get(&bib_url).timeout(timeout).send().await {
                        Ok(resp) if resp.status().is_success() => match resp.text().await {
                            Ok(text) => text,
                            Err(e) => return ExtractionOutcome::Error(format!("bibtex body: {e}")),
                        },
                        Ok(resp) => {
                            return ExtractionOutcome::Error(format!(
                                "bibtex fetch status {}",
                                resp.status()
                            ));
                        }
                        Err(e) => return ExtractionOutcome::Error(format!("bibtex fetch: {e}")),
                    };
                    match bibtex_pages(&bibtex) {
                        Some(pages) => ExtractionOutcome::Pages(pages),
                        None => ExtractionOutcome::NoData,
                    }
                }
            }
        })
    }
}

fn dblp_pagination(html: &str) -> Option<PageRange> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(r#"span[itemprop="pagination"], span.pages"#).ok()?;
    doc.select(&selector)
        .filter_map(|el| PageRange::parse(&el.text().collect::<String>()))
        .next()
}

/// First link whose visible text mentions BibTeX, made absolute.
fn bibtex_link(html: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let href = doc.select(&selector).find_map(|a| {
        let text = a.text().collect::<String>().to_lowercase();
        if text.contains("bibtex") {
            a.value().attr("href").map(str::to_string)
        } else {
            None
        }
    })?;
    if href.starts_with("http") {
        return Some(href);
    }
    let origin = base_url
        .find("://")
        .and_then(|i| base_url[i + 3..].find('/').map(|j| &base_url[..i + 3 + j]))
        .unwrap_or(base_url);
    Some(format!("{origin}{href}"))
}
