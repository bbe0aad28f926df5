//! Fixed-outcome strategy for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ExtractionContext, ExtractionOutcome, PageStrategy, StrategyFuture};

/// A strategy that always returns the same outcome and counts its calls.
#[derive(Debug)]
pub struct MockStrategy {
    name: String,
    outcome: ExtractionOutcome,
    calls: AtomicUsize,
}

impl MockStrategy {
    pub fn new(name: impl Into<String>, outcome: ExtractionOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(
        &'a self,
        _ctx: &'a mut ExtractionContext,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> StrategyFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}
