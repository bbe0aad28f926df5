//! Structured payload inspection: no network, just a second look at the
//! raw record for page fields under names the adapter parser did not map
//! (`page`, `pages`, nested `journal.pages`, embedded BibTeX).

use std::time::Duration;
use serde_json::Value;

use crate::PageRange;
use super::{ExtractionContext, ExtractionOutcome, PageStrategy, StrategyFuture, bibtex_pages};

#[derive(Debug, Default)]
pub struct StructuredCitation;

impl PageStrategy for StructuredCitation {
    fn name(&self) -> &str {
        "structured"
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a mut ExtractionContext,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            if let Some(pages) = ctx.record.pages {
                return ExtractionOutcome::Pages(pages);
            }
            match pages_from_payload(&ctx.record.raw) {
                Some(pages) => ExtractionOutcome::Pages(pages),
                None => ExtractionOutcome::NoData,
            }
        })
    }
}

fn pages_from_payload(raw: &Value) -> Option<PageRange> {
    const PATHS: &[&str] = &[
        "/pages",
        "/page",
        "/journal/pages",
        "/info/pages",
        "/biblio/first_page",
    ];
    for path in PATHS {
        if let Some(text) = raw.pointer(path).and_then(Value::as_str) {
            if let Some(pages) = PageRange::parse(text) {
                return Some(pages);
            }
        }
    }
    raw.pointer("/bibtex")
        .or_else(|| raw.pointer("/citation/bibtex"))
        .and_then(Value::as_str)
        .and_then(bibtex_pages)
}
