//! Highwire citation metadata.
//!
//! Most publisher landing pages embed `citation_firstpage` /
//! `citation_lastpage` meta tags for indexers; this strategy fetches the
//! record's landing page and reads them.

use std::time::Duration;
use scraper::{Html, Selector};

use crate::PageRange;
use super::{ExtractionContext, ExtractionOutcome, FetchError, PageStrategy, StrategyFuture};

#[derive(Debug, Default)]
pub struct DocumentMeta;

impl PageStrategy for DocumentMeta {
    fn name(&self) -> &str {
        "document_meta"
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
            match citation_pages(&html) {
                Some(pages) => ExtractionOutcome::Pages(pages),
                None => ExtractionOutcome::NoData,
            }
        })
    }
}

fn citation_pages(html: &str) -> Option<PageRange> {
    let doc = Html::parse_document(html);
    let first = meta_content(&doc, "citation_firstpage")?;
    let first: u32 = first.trim().parse().ok()?;
    match meta_content(&doc, "citation_lastpage")
        .and_then(|v| v.trim().parse::<u32>().ok())
    {
        Some(last) => PageRange::span(first, last),
        None => Some(PageRange::single(first)),
    }
}

fn meta_content(doc: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_and_last_page() {
        let html = r#"<html><head>
            <meta name="citation_title" content="A Paper"/>
            <meta name="citation_firstpage" content="770"/>
            <meta name="citation_lastpage" content="778"/>
            </head><body/></html>"#;
        assert_eq!(citation_pages(html), PageRange::span(770, 778));
    }

    #[test]
    fn first_page_only_is_single() {
        let html = r#"<meta name="citation_firstpage" content="42">"#;
        assert_eq!(citation_pages(html), Some(PageRange::single(42)));
    }

    #[test]
    fn non_numeric_first_page() {
        let html = r#"<meta name="citation_firstpage" content="e0123">"#;
        assert_eq!(citation_pages(html), None);
    }

    #[test]
    fn inverted_range_rejected() {
        let html = r#"
            <meta name="citation_firstpage" content="778">
            <meta name="citation_lastpage" content="770">"#;
        assert_eq!(citation_pages(html), None);
    }

    #[test]
    fn absent_tags() {
        assert_eq!(citation_pages("<html><body>nothing</body></html>"), None);
    }
}
