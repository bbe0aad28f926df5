//! Query normalization and title similarity scoring.
//!
//! Scoring blends token-set overlap (coverage of the query's tokens,
//! Jaccard, length and ordering agreement) with a character-level fuzzy
//! ratio. Scores land in `[0.0, 1.0]`; a candidate is accepted when its
//! score meets the configured threshold (inclusive).

use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::{CandidateRecord, ScoredCandidate};

/// Default acceptance threshold for title matches.
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.85;

/// Canonicalize a title for comparison and cache keying.
///
/// Unicode is NFKD-decomposed and reduced to ASCII, punctuation becomes
/// whitespace, everything is lowercased, and runs of whitespace collapse
/// to single spaces. Idempotent: normalizing a normalized string is a
/// no-op.
pub fn normalize_query(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = true;
    for c in title.nfkd() {
        if !c.is_ascii() {
            // Combining marks and other non-ASCII leftovers drop out.
            continue;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Similarity between a query title and a candidate title, in `[0.0, 1.0]`.
///
/// Deterministic: no randomness, no clocks, no allocation-order effects.
pub fn similarity(query: &str, candidate: &str) -> f64 {
    let q = normalize_query(query);
    let c = normalize_query(candidate);
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }
    if q == c {
        return 1.0;
    }

    let q_tokens: Vec<&str> = q.split(' ').collect();
    let c_tokens: Vec<&str> = c.split(' ').collect();

    // Whole query contained in a longer candidate title: grade by how many
    // extra words the candidate carries. A subtitle or two is probably the
    // same paper; a much longer title is probably a different one that
    // happens to embed the query.
    if contains_token_seq(&c_tokens, &q_tokens) {
        let extra = c_tokens.len() - q_tokens.len();
        return match extra {
            0 => 1.0,
            1 => 0.95,
            2 => 0.90,
            3 | 4 => 0.80,
            _ => 0.65,
        };
    }

    let q_set: HashSet<&str> = q_tokens.iter().copied().collect();
    let c_set: HashSet<&str> = c_tokens.iter().copied().collect();
    let overlap = q_set.intersection(&c_set).count() as f64;
    let union = q_set.union(&c_set).count() as f64;

    let coverage = overlap / q_set.len() as f64;
    let jaccard = overlap / union;
    let length = {
        let (a, b) = (q.len() as f64, c.len() as f64);
        1.0 - (a - b).abs() / a.max(b)
    };
    let order = token_order_score(&q_tokens, &c_tokens);

    let mut token_score = coverage * 0.5 + jaccard * 0.3 + length * 0.15 + order * 0.05;
    if coverage >= 1.0 {
        // Every query token present: likely the same paper with extra words.
        token_score = (token_score * 1.1).min(1.0);
    }

    let char_score = rapidfuzz::fuzz::ratio(q.chars(), c.chars());

    (token_score * 0.7 + char_score * 0.3).clamp(0.0, 1.0)
}

/// Fraction of query tokens that appear in the candidate in the same
/// relative order (longest common subsequence over tokens).
fn token_order_score(query: &[&str], candidate: &[&str]) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let mut prev = vec![0usize; candidate.len() + 1];
    let mut cur = vec![0usize; candidate.len() + 1];
    for qt in query {
        for (j, ct) in candidate.iter().enumerate() {
            cur[j + 1] = if qt == ct {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[candidate.len()] as f64 / query.len() as f64
}

fn contains_token_seq(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Scores candidates against a query and picks the best acceptable one.
#[derive(Debug, Clone)]
pub struct MatchScorer {
    threshold: f64,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_THRESHOLD)
    }
}

impl MatchScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Acceptance is inclusive: a score exactly at the threshold passes.
    pub fn is_acceptable(&self, score: f64) -> bool {
        score >= self.threshold
    }

    pub fn score(&self, query: &str, candidate_title: &str) -> f64 {
        similarity(query, candidate_title)
    }

    /// Score every candidate and return the best acceptable one, or `None`
    /// if no candidate clears the threshold.
    ///
    /// Ties on score prefer the record with both venue and year populated,
    /// then the earlier position in the source's result list.
    pub fn pick_best(&self, query: &str, candidates: &[CandidateRecord]) -> Option<ScoredCandidate> {
        let mut best: Option<ScoredCandidate> = None;
        for (position, record) in candidates.iter().enumerate() {
            let score = self.score(query, &record.title);
            if !self.is_acceptable(score) {
                continue;
            }
            let scored = ScoredCandidate {
                record: record.clone(),
                score,
                accepted: true,
                position,
            };
            best = Some(match best.take() {
                None => scored,
                Some(cur) => {
                    if prefer_over(&scored, &cur) {
                        scored
                    } else {
                        cur
                    }
                }
            });
        }
        best
    }
}

/// True when `a` should replace `b` as the current best.
fn prefer_over(a: &ScoredCandidate, b: &ScoredCandidate) -> bool {
    const EPS: f64 = 1e-9;
    if (a.score - b.score).abs() > EPS {
        return a.score > b.score;
    }
    let complete = |s: &ScoredCandidate| s.record.venue.is_some() && s.record.year.is_some();
    match (complete(a), complete(b)) {
        (true, false) => true,
        (false, true) => false,
        // Earlier position wins; b always precedes a in iteration order.
        _ => false,
    }
}
