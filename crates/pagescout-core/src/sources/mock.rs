//! Scripted in-memory adapter for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::CandidateRecord;
use super::{SourceAdapter, SourceError, SourceFuture};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Candidates(Vec<CandidateRecord>),
    Error(SourceError),
    /// Sleep before returning an empty result, for timeout/cancel tests.
    Delay(Duration),
}

/// An adapter that plays back a fixed script of responses, one per call,
/// repeating the final entry afterwards. Call counts are observable so
/// tests can assert short-circuiting.
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    script: Vec<MockResponse>,
    calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, script: Vec<MockResponse>) -> Self {
        Self {
            name: name.into(),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns the same candidate list.
    pub fn returning(name: impl Into<String>, candidates: Vec<CandidateRecord>) -> Self {
        Self::new(name, vec![MockResponse::Candidates(candidates)])
    }

    /// Always returns empty results.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::returning(name, vec![])
    }

    /// Always fails with the given error.
    pub fn failing(name: impl Into<String>, error: SourceError) -> Self {
        Self::new(name, vec![MockResponse::Error(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.last() {
            None => MockResponse::Candidates(vec![]),
            Some(last) => self.script.get(call).unwrap_or(last).clone(),
        }
    }
}

impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(
        &'a self,
        _title: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> SourceFuture<'a> {
        let response = self.next_response();
        Box::pin(async move {
            match response {
                MockResponse::Candidates(c) => Ok(c),
                MockResponse::Error(e) => Err(e),
                MockResponse::Delay(d) => {
                    tokio::time::sleep(d).await;
                    Ok(vec![])
                }
            }
        })
    }
}
