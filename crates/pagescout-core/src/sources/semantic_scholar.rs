//! Semantic Scholar Graph API.
//!
//! Free tier is heavily rate limited; an API key (sent as `x-api-key`)
//! raises the quota, which the shared limiter accounts for.

use std::time::Duration;
use serde_json::Value;

use crate::CandidateRecord;
use super::{SourceAdapter, SourceError, SourceFuture};

const API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const FIELDS: &str = "title,authors,year,venue,journal,externalIds,url";

#[derive(Debug, Default)]
pub struct SemanticScholarAdapter {
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

impl SourceAdapter for SemanticScholarAdapter {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SourceFuture<'a> {
        Box::pin(async move {
            let mut req = client
                .get(API_URL)
                .query(&[("query", title), ("fields", FIELDS), ("limit", "10")])
                .timeout(timeout);
            if let Some(key) = &self.api_key {
                req = req.header("x-api-key", key);
            }
            let resp = req.send().await.map_err(SourceError::from_reqwest)?;
            if let Some(err) = SourceError::from_status(&resp) {
                return Err(err);
            }
            let body: Value = resp
                .json()
                .await
                .map_err(|e| SourceError::Malformed(e.to_string()))?;
            Ok(parse_results(&body))
        })
    }
}

fn parse_results(body: &Value) -> Vec<CandidateRecord> {
    let Some(data) = body.get("data").and_then(Value::as_array) else {
        return vec![];
    };
    data.iter().filter_map(parse_paper).collect()
}

fn parse_paper(paper: &Value) -> Option<CandidateRecord> {
    let title = paper.get("title").and_then(Value::as_str)?.to_string();

    let mut record = CandidateRecord::bare(title, "semantic_scholar");
    record.authors = paper
        .get("authors")
        .and_then(Value::as_array)
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    record.year = paper.get("year").and_then(Value::as_i64).map(|y| y as i32);
    record.venue = paper
        .get("venue")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    // Page numbers live under "journal" even for conference papers.
    record.pages = paper
        .pointer("/journal/pages")
        .and_then(Value::as_str)
        .and_then(crate::PageRange::parse);
    record.volume = paper
        .pointer("/journal/volume")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.doi = paper
        .pointer("/externalIds/DOI")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.url = paper.get("url").and_then(Value::as_str).map(str::to_string);
    record.raw = paper.clone();
    Some(record)
}
