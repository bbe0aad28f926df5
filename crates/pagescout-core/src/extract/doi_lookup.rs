//! DOI content negotiation.
//!
//! `https://doi.org/<doi>` with `Accept: application/x-bibtex` returns
//! the publisher's BibTeX record, which carries pages for most journal
//! and proceedings entries.

use std::time::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{ExtractionContext, ExtractionOutcome, PageStrategy, StrategyFuture, bibtex_pages};

static DOI_IN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(10\.\d{4,9}/[^\s?#]+)").unwrap());

#[derive(Debug, Default)]
pub struct DoiLookup;

impl DoiLookup {
    fn doi_for(ctx: &ExtractionContext) -> Option<String> {
        if let Some(doi) = &ctx.record.doi {
            return Some(doi.clone());
        }
        ctx.record
            .url
            .as_deref()
            .and_then(|url| DOI_IN_URL.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl PageStrategy for DoiLookup {
    fn name(&self) -> &str {
        "doi_lookup"
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a mut ExtractionContext,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            let Some(doi) = Self::doi_for(ctx) else {
                return ExtractionOutcome::NoData;
            };
            let url = format!("https://doi.org/{}", urlencoding::encode(&doi));
            let resp = match client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/x-bibtex")
                .timeout(timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => return ExtractionOutcome::Error(format!("doi request: {e}")),
            };
            match resp.status() {
                reqwest::StatusCode::NOT_FOUND => return ExtractionOutcome::NoData,
                reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    return ExtractionOutcome::Error("doi.org rate limited".to_string());
                }
                status if !status.is_success() => {
                    return ExtractionOutcome::Error(format!("doi.org status {status}"));
                }
                _ => {}
            }
            let bibtex = match resp.text().await {
                Ok(text) => text,
                Err(e) => return ExtractionOutcome::Error(format!("doi body: {e}")),
            };
            match bibtex_pages(&bibtex) {
                Some(pages) => ExtractionOutcome::Pages(pages),
                None => ExtractionOutcome::NoData,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateRecord;

    #[test]
    fn doi_taken_from_record_field() {
        let mut record = CandidateRecord::bare("T", "mock");
        record.doi = Some("10.1109/cvpr.2016.90".to_string());
        let ctx = ExtractionContext::new(record);
        assert_eq!(DoiLookup::doi_for(&ctx).as_deref(), Some("10.1109/cvpr.2016.90"));
    }

    #[test]
    fn doi_extracted_from_url() {
        let mut record = CandidateRecord::bare("T", "mock");
        record.url = Some("https://doi.org/10.1145/3292500.3330701?ref=x".to_string());
        let ctx = ExtractionContext::new(record);
        assert_eq!(
            DoiLookup::doi_for(&ctx).as_deref(),
            Some("10.1145/3292500.3330701")
        );
    }

    #[test]
    fn no_doi_anywhere() {
        let mut record = CandidateRecord::bare("T", "mock");
        record.url = Some("https://papers.nips.cc/paper/7181".to_string());
        let ctx = ExtractionContext::new(record);
        assert_eq!(DoiLookup::doi_for(&ctx), None);
    }

    #[tokio::test]
    async fn missing_doi_is_no_data() {
        let mut ctx = ExtractionContext::new(CandidateRecord::bare("T", "mock"));
        let client = reqwest::Client::new();
        let outcome = DoiLookup
            .attempt(&mut ctx, &client, Duration::from_secs(1))
            .await;
        assert_eq!(outcome, ExtractionOutcome::NoData);
    }
}
