//! End-to-end resolution pipeline tests over scripted adapters.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pagescout_core::extract::{ExtractionChain, ExtractionOutcome, MockStrategy};
use pagescout_core::sources::{MockAdapter, MockResponse, SourceAdapter, SourceError};
use pagescout_core::{
    CandidateRecord, Config, PageRange, Resolution, ResolutionCache, Resolver,
};

const TITLE: &str = "Attention Is All You Need";

fn full_candidate() -> CandidateRecord {
    let mut record = CandidateRecord::bare(TITLE, "alpha");
    record.authors = vec!["Ashish Vaswani".to_string()];
    record.year = Some(2017);
    record.venue = Some("NIPS".to_string());
    record.pages = PageRange::span(5998, 6008);
    record
}

fn test_config() -> Config {
    Config {
        cache: Some(Arc::new(ResolutionCache::new(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ))),
        ..Config::default()
    }
}

fn empty_chain() -> ExtractionChain {
    ExtractionChain::with_strategies(vec![], Duration::from_secs(1))
}

fn resolver_with(
    config: Config,
    sources: Vec<Arc<dyn SourceAdapter>>,
    chain: ExtractionChain,
) -> Resolver {
    Resolver::with_parts(config, sources, chain).unwrap()
}

#[tokio::test]
async fn exact_match_resolves_from_first_source() {
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
    let beta = Arc::new(MockAdapter::returning("beta", vec![full_candidate()]));
    let resolver = resolver_with(
        test_config(),
        vec![alpha.clone(), beta.clone()],
        empty_chain(),
    );

    let resolution = resolver.resolve(TITLE, true).await;
    let Resolution::Resolved(paper) = resolution else {
        panic!("expected a resolved paper");
    };
    assert_eq!(paper.record.title, TITLE);
    assert_eq!(paper.record.source, "alpha");
    assert_eq!(paper.record.pages, PageRange::span(5998, 6008));
    assert_eq!(paper.record.year, Some(2017));

    // First source won; the second was never consulted.
    assert_eq!(alpha.call_count(), 1);
    assert_eq!(beta.call_count(), 0);
}

#[tokio::test]
async fn below_threshold_candidates_fall_through_to_next_source() {
    let near_miss = CandidateRecord::bare(
        "Attention Is All You Need In Speech Separation For Noisy Environments",
        "alpha",
    );
    let mut beta_candidate = full_candidate();
    beta_candidate.source = "beta".to_string();
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![near_miss]));
    let beta = Arc::new(MockAdapter::returning("beta", vec![beta_candidate]));
    let resolver = resolver_with(
        test_config(),
        vec![alpha.clone(), beta.clone()],
        empty_chain(),
    );

    let resolution = resolver.resolve(TITLE, true).await;
    let Resolution::Resolved(paper) = resolution else {
        panic!("expected a resolved paper");
    };
    assert_eq!(paper.record.source, "beta");
    assert_eq!(alpha.call_count(), 1);
    assert_eq!(beta.call_count(), 1);
}

#[tokio::test]
async fn failing_source_is_skipped_not_fatal() {
    let alpha = Arc::new(MockAdapter::failing(
        "alpha",
        SourceError::Http("status 500".to_string()),
    ));
    let beta = Arc::new(MockAdapter::returning("beta", vec![full_candidate()]));
    let resolver = resolver_with(
        test_config(),
        vec![alpha.clone(), beta.clone()],
        empty_chain(),
    );

    assert!(matches!(
        resolver.resolve(TITLE, true).await,
        Resolution::Resolved(_)
    ));
    assert_eq!(alpha.call_count(), 1);
    assert_eq!(beta.call_count(), 1);
}

#[tokio::test]
async fn exhausted_sources_yield_not_found() {
    let alpha = Arc::new(MockAdapter::empty("alpha"));
    let beta = Arc::new(MockAdapter::failing("beta", SourceError::Timeout));
    let resolver = resolver_with(test_config(), vec![alpha, beta], empty_chain());

    assert_eq!(resolver.resolve("An Unheard Of Paper", true).await, Resolution::NotFound);
}

#[tokio::test]
async fn second_resolve_is_served_from_cache() {
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
    let resolver = resolver_with(test_config(), vec![alpha.clone()], empty_chain());

    let first = resolver.resolve(TITLE, true).await;
    // Same title, different case and punctuation: one normalized key.
    let second = resolver.resolve("attention is all you need!", true).await;
    assert_eq!(first, second);
    assert_eq!(alpha.call_count(), 1);

    let stats = resolver.cache().stats();
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn no_cache_read_still_writes_back() {
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
    let resolver = resolver_with(test_config(), vec![alpha.clone()], empty_chain());

    resolver.resolve(TITLE, false).await;
    resolver.resolve(TITLE, false).await;
    // Reads bypassed the cache, so the source ran twice...
    assert_eq!(alpha.call_count(), 2);
    // ...but the outcome was recorded both times.
    assert_eq!(resolver.cache().len(), 1);
    assert!(resolver.cache().get(TITLE).is_some());
}

#[tokio::test]
async fn not_found_is_negatively_cached() {
    let alpha = Arc::new(MockAdapter::empty("alpha"));
    let resolver = resolver_with(test_config(), vec![alpha.clone()], empty_chain());

    assert_eq!(resolver.resolve("Ghost Paper", true).await, Resolution::NotFound);
    assert_eq!(resolver.resolve("Ghost Paper", true).await, Resolution::NotFound);
    // The second miss came from the cache.
    assert_eq!(alpha.call_count(), 1);
}

#[tokio::test]
async fn expired_negative_entry_triggers_requery() {
    let alpha = Arc::new(MockAdapter::new(
        "alpha",
        vec![
            MockResponse::Candidates(vec![]),
            MockResponse::Candidates(vec![full_candidate()]),
        ],
    ));
    let config = Config {
        // Zero negative TTL: a not-found marker expires immediately.
        cache: Some(Arc::new(ResolutionCache::new(
            Duration::from_secs(3600),
            Duration::ZERO,
        ))),
        ..Config::default()
    };
    let resolver = resolver_with(config, vec![alpha.clone()], empty_chain());

    assert_eq!(resolver.resolve(TITLE, true).await, Resolution::NotFound);
    // The marker is already stale, so this goes back out and now succeeds.
    assert!(matches!(
        resolver.resolve(TITLE, true).await,
        Resolution::Resolved(_)
    ));
    assert_eq!(alpha.call_count(), 2);
}

#[tokio::test]
async fn missing_pages_are_filled_by_the_chain() {
    let mut candidate = full_candidate();
    candidate.pages = None;
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![candidate]));

    let first = Arc::new(MockStrategy::new("first", ExtractionOutcome::NoData));
    let second = Arc::new(MockStrategy::new(
        "second",
        ExtractionOutcome::Error("upstream 503".to_string()),
    ));
    let third = Arc::new(MockStrategy::new(
        "third",
        ExtractionOutcome::Pages(PageRange::span(5998, 6008).unwrap()),
    ));
    let fourth = Arc::new(MockStrategy::new(
        "fourth",
        ExtractionOutcome::Pages(PageRange::span(1, 2).unwrap()),
    ));
    let chain = ExtractionChain::with_strategies(
        vec![first.clone(), second.clone(), third.clone(), fourth.clone()],
        Duration::from_secs(1),
    );
    let resolver = resolver_with(test_config(), vec![alpha], chain);

    let Resolution::Resolved(paper) = resolver.resolve(TITLE, true).await else {
        panic!("expected a resolved paper");
    };
    assert_eq!(paper.record.pages, PageRange::span(5998, 6008));
    assert_eq!(paper.pages_source.as_deref(), Some("third"));
    // First valid range stops the chain.
    assert_eq!(fourth.call_count(), 0);
}

#[tokio::test]
async fn chain_is_skipped_when_source_already_has_pages() {
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
    let strategy = Arc::new(MockStrategy::new(
        "never",
        ExtractionOutcome::Pages(PageRange::span(1, 2).unwrap()),
    ));
    let chain =
        ExtractionChain::with_strategies(vec![strategy.clone()], Duration::from_secs(1));
    let resolver = resolver_with(test_config(), vec![alpha], chain);

    let Resolution::Resolved(paper) = resolver.resolve(TITLE, true).await else {
        panic!("expected a resolved paper");
    };
    assert_eq!(paper.record.pages, PageRange::span(5998, 6008));
    assert_eq!(paper.pages_source, None);
    assert_eq!(strategy.call_count(), 0);
}

#[tokio::test]
async fn exhausted_chain_leaves_paper_resolved_without_pages() {
    let mut candidate = full_candidate();
    candidate.pages = None;
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![candidate]));
    let chain = ExtractionChain::with_strategies(
        vec![
            Arc::new(MockStrategy::new("a", ExtractionOutcome::NoData)),
            Arc::new(MockStrategy::new(
                "b",
                ExtractionOutcome::Error("llm authentication rejected".to_string()),
            )),
        ],
        Duration::from_secs(1),
    );
    let resolver = resolver_with(test_config(), vec![alpha], chain);

    // Metadata still comes through; only the pages are missing.
    let Resolution::Resolved(paper) = resolver.resolve(TITLE, true).await else {
        panic!("expected a resolved paper");
    };
    assert_eq!(paper.record.pages, None);
    assert_eq!(paper.pages_source, None);
    assert_eq!(paper.record.year, Some(2017));
}

#[tokio::test]
async fn cached_resolution_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let make_config = || Config {
        cache: Some(Arc::new(
            ResolutionCache::open(&path, Duration::from_secs(3600), Duration::from_secs(3600))
                .unwrap(),
        )),
        ..Config::default()
    };

    {
        let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
        let resolver = resolver_with(make_config(), vec![alpha], empty_chain());
        resolver.resolve(TITLE, true).await;
    }

    // Fresh process: the adapter now fails, but the disk cache answers.
    let alpha = Arc::new(MockAdapter::failing(
        "alpha",
        SourceError::Http("offline".to_string()),
    ));
    let resolver = resolver_with(make_config(), vec![alpha.clone()], empty_chain());
    let Resolution::Resolved(paper) = resolver.resolve(TITLE, true).await else {
        panic!("expected the persisted resolution");
    };
    assert_eq!(paper.record.pages, PageRange::span(5998, 6008));
    assert_eq!(alpha.call_count(), 0);
}

#[tokio::test]
async fn batch_resolves_in_order() {
    let alpha = Arc::new(MockAdapter::returning("alpha", vec![full_candidate()]));
    let resolver = resolver_with(test_config(), vec![alpha], empty_chain());

    let titles = vec![TITLE.to_string(), "Ghost Paper".to_string()];
    let results = resolver
        .resolve_batch(&titles, true, CancellationToken::new())
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, TITLE);
    assert!(matches!(results[0].1, Resolution::Resolved(_)));
    // "Ghost Paper" scores far below threshold against the only candidate.
    assert_eq!(results[1].1, Resolution::NotFound);
}

#[tokio::test]
async fn cancelled_batch_finishes_the_inflight_title() {
    // Each lookup takes 200ms; the cancel lands mid-way through "One".
    // The title already running finishes (and is cached), the rest never start.
    let alpha = Arc::new(MockAdapter::new(
        "alpha",
        vec![MockResponse::Delay(Duration::from_millis(200))],
    ));
    let resolver = resolver_with(test_config(), vec![alpha.clone()], empty_chain());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let titles = vec!["One".to_string(), "Two".to_string(), "Three".to_string()];
    let results = resolver.resolve_batch(&titles, true, cancel).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "One");
    assert_eq!(results[0].1, Resolution::NotFound);
    assert_eq!(alpha.call_count(), 1);
    assert_eq!(resolver.cache().len(), 1);
}
