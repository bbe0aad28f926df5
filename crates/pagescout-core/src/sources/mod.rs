//! Source adapters: one module per upstream bibliographic service.
//!
//! Every adapter speaks the same contract: given a raw title, return zero
//! or more [`CandidateRecord`]s, or a [`SourceError`] describing why it
//! could not. Adapters never decide whether a candidate matches; that is
//! the scorer's job.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::CandidateRecord;

pub mod crossref;
pub mod dblp;
pub mod mock;
pub mod neurips;
pub mod semantic_scholar;

pub use crossref::CrossrefAdapter;
pub use dblp::DblpAdapter;
pub use mock::{MockAdapter, MockResponse};
pub use neurips::NeuripsAdapter;
pub use semantic_scholar::SemanticScholarAdapter;

/// Why a source lookup failed. Failures are per-source and never abort the
/// orchestration; the orchestrator logs them and moves to the next source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The service asked us to back off.
    RateLimited { retry_after: Option<Duration> },
    /// The request did not complete within the allotted time.
    Timeout,
    /// Transport or non-success HTTP status.
    Http(String),
    /// The service answered but the payload was not what we expect.
    Malformed(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::RateLimited { retry_after: Some(d) } => {
                write!(f, "rate limited (retry after {}s)", d.as_secs())
            }
            SourceError::RateLimited { retry_after: None } => write!(f, "rate limited"),
            SourceError::Timeout => write!(f, "request timed out"),
            SourceError::Http(msg) => write!(f, "http error: {msg}"),
            SourceError::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Map a transport error, folding timeouts into their own variant.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Http(e.to_string())
        }
    }

    /// Interpret an HTTP status, pulling `Retry-After` out of 429s.
    pub(crate) fn from_status(resp: &reqwest::Response) -> Option<Self> {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Some(SourceError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Some(SourceError::Http(format!("status {status}")));
        }
        None
    }
}

pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<CandidateRecord>, SourceError>> + Send + 'a>>;

/// A single upstream bibliographic service.
///
/// Object-safe so the orchestrator can hold a priority-ordered
/// `Vec<Arc<dyn SourceAdapter>>`; implementations box their futures.
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used in configuration, logs, and records.
    fn name(&self) -> &str;

    /// Look up candidates for a raw (unnormalized) title.
    ///
    /// `timeout` bounds each HTTP request the adapter makes.
    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SourceFuture<'a>;
}
