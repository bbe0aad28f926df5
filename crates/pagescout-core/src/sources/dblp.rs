//! DBLP publication search API.
//!
//! <https://dblp.org/search/publ/api?q=...&format=json>. Pages, venue,
//! and year come straight from the hit payload, so matches here rarely
//! need the extraction chain at all.

use std::time::Duration;
use serde_json::Value;

use crate::CandidateRecord;
use super::{SourceAdapter, SourceError, SourceFuture};

const API_URL: &str = "https://dblp.org/search/publ/api";
const MAX_HITS: &str = "10";

#[derive(Debug, Default)]
pub struct DblpAdapter;

impl SourceAdapter for DblpAdapter {
    fn name(&self) -> &str {
        "dblp"
    }

    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SourceFuture<'a> {
        Box::pin(async move {
            let resp = client
                .get(API_URL)
                .query(&[("q", title), ("format", "json"), ("h", MAX_HITS)])
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
            Ok(parse_hits(&body))
        })
    }
}

fn parse_hits(body: &Value) -> Vec<CandidateRecord> {
    let Some(hits) = body
        .pointer("/result/hits/hit")
        .and_then(Value::as_array)
    else {
        return vec![];
    };
    hits.iter()
        .filter_map(|hit| hit.get("info"))
        .filter_map(parse_info)
        .collect()
}

fn parse_info(info: &Value) -> Option<CandidateRecord> {
    let title = info
        .get("title")
        .and_then(Value::as_str)?
        .trim_end_matches('.')
        .to_string();

    let mut record = CandidateRecord::bare(title, "dblp");
    record.authors = parse_authors(info);
    record.year = info
        .get("year")
        .and_then(Value::as_str)
        .and_then(|y| y.parse().ok());
    record.venue = match info.get("venue") {
        // Multi-venue entries (journal reprints etc.) come as an array.
        Some(Value::Array(vs)) => vs.first().and_then(Value::as_str).map(str::to_string),
        Some(Value::String(v)) => Some(v.clone()),
        _ => None,
    };
    record.pages = info
        .get("pages")
        .and_then(Value::as_str)
        .and_then(crate::PageRange::parse);
    record.doi = info.get("doi").and_then(Value::as_str).map(str::to_string);
    record.volume = info.get("volume").and_then(Value::as_str).map(str::to_string);
    // "ee" is the electronic edition (publisher page), "url" the dblp
    // record. Prefer the publisher page; extraction can do more with it.
    record.url = info
        .get("ee")
        .or_else(|| info.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);
    record.raw = info.clone();
    Some(record)
}

fn parse_authors(info: &Value) -> Vec<String> {
    match info.pointer("/authors/author") {
        // Single-author papers come through as a bare object.
        Some(author @ Value::Object(_)) => author_name(author).into_iter().collect(),
        Some(Value::Array(list)) => list.iter().filter_map(author_name).collect(),
        _ => vec![],
    }
}

fn author_name(author: &Value) -> Option<String> {
    let text = match author {
        Value::Object(_) => author.get("text").and_then(Value::as_str)?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    // dblp disambiguates homonyms with a numeric suffix ("Wei Wang 0001").
    Some(
        text.trim_end_matches(|c: char| c.is_ascii_digit())
            .trim()
            .to_string(),
    )
}
