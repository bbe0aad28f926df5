//! CrossRef works API.
//!
//! Passing a `mailto` puts requests in the polite pool, which gets both
//! better latency and a higher rate limit.

use std::time::Duration;
use serde_json::Value;

use crate::CandidateRecord;
use super::{SourceAdapter, SourceError, SourceFuture};

const API_URL: &str = "https://api.crossref.org/works";

#[derive(Debug, Default)]
pub struct CrossrefAdapter {
    mailto: Option<String>,
}

impl CrossrefAdapter {
    pub fn new(mailto: Option<String>) -> Self {
        Self { mailto }
    }
}

impl SourceAdapter for CrossrefAdapter {
    fn name(&self) -> &str {
        "crossref"
    }

    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SourceFuture<'a> {
        Box::pin(async move {
            let mut query: Vec<(&str, &str)> =
                vec![("query.title", title), ("rows", "10")];
            if let Some(mailto) = &self.mailto {
                query.push(("mailto", mailto));
            }
            let resp = client
                .get(API_URL)
                .query(&query)
                .timeout(timeout)
                .send()
                .await
                .map_err(SourceError::from_reqwest)?;
            if let Some(err) = SourceError::from_status(&resp) {
                return Err(err);
            }
            let body: Value = resp
                .json()
                .await
                .map_err(|e| SourceError::Malformed(e.to_string()))?;
            Ok(parse_items(&body))
        })
    }
}

fn parse_items(body: &Value) -> Vec<CandidateRecord> {
    let Some(items) = body.pointer("/message/items").and_then(Value::as_array) else {
        return vec![];
    };
    items.iter().filter_map(parse_item).collect()
}

fn parse_item(item: &Value) -> Option<CandidateRecord> {
    let title = item
        .pointer("/title/0")
        .and_then(Value::as_str)?
        .to_string();

    let mut record = CandidateRecord::bare(title, "crossref");
    record.authors = item
        .get("author")
        .and_then(Value::as_array)
        .map(|authors| authors.iter().filter_map(author_name).collect())
        .unwrap_or_default();
    record.year = item
        .pointer("/issued/date-parts/0/0")
        .and_then(Value::as_i64)
        .map(|y| y as i32);
    record.venue = item
        .pointer("/container-title/0")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.pages = item
        .get("page")
        .and_then(Value::as_str)
        .and_then(crate::PageRange::parse);
    record.volume = item.get("volume").and_then(Value::as_str).map(str::to_string);
    record.issue = item.get("issue").and_then(Value::as_str).map(str::to_string);
    record.doi = item.get("DOI").and_then(Value::as_str).map(str::to_string);
    record.url = item.get("URL").and_then(Value::as_str).map(str::to_string);
    record.raw = item.clone();
    Some(record)
}

fn author_name(author: &Value) -> Option<String> {
    let family = author.get("family").and_then(Value::as_str);
    let given = author.get("given").and_then(Value::as_str);
    match (given, family) {
        (Some(g), Some(f)) => Some(format!("{g} {f}")),
        (None, Some(f)) => Some(f.to_string()),
        // Consortia and the like carry only a "name".
        _ => author.get("name").and_then(Value::as_str).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageRange;

    #[test]
    fn parses_items() {
        let body = serde_json::json!({
            "message": {
                "items": [{
                    "title": ["Deep Residual Learning for Image Recognition"],
                    "author": [
                        {"given": "Kaiming", "family": "He"},
                        {"name": "The Vision Consortium"}
                    ],
                    "issued": {"date-parts": [[2016, 6]]},
                    "container-title": ["2016 IEEE Conference on Computer Vision and Pattern Recognition (CVPR)"],
                    "page": "770-778",
                    "volume": "1",
                    "DOI": "10.1109/cvpr.2016.90",
                    "URL": "https://doi.org/10.1109/cvpr.2016.90"
                }]
            }
        });
        let records = parse_items(&body);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title, "Deep Residual Learning for Image Recognition");
        assert_eq!(r.authors, vec!["Kaiming He", "The Vision Consortium"]);
        assert_eq!(r.year, Some(2016));
        assert_eq!(r.pages, PageRange::span(770, 778));
        assert_eq!(r.doi.as_deref(), Some("10.1109/cvpr.2016.90"));
        assert_eq!(r.source, "crossref");
    }

    #[test]
    fn item_without_title_is_skipped() {
        let body = serde_json::json!({
            "message": {"items": [{"DOI": "10.0/notitle"}, {"title": ["Ok"]}]}
        });
        assert_eq!(parse_items(&body).len(), 1);
    }
}
