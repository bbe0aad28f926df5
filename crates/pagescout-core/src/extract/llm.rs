//! LLM-assisted extraction, last in the chain.
//!
//! Sends the stripped landing-page text to a chat-completions endpoint
//! and asks for the page range in a fixed reply format. Replies that do
//! not contain a parseable range, including explicit "not found"
//! phrasings, collapse to [`ExtractionOutcome::NoData`]; transport and
//! auth failures stay distinguishable as errors.

use std::time::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::{CoreError, LlmConfig, PageRange};
use super::{ExtractionContext, ExtractionOutcome, PageStrategy, StrategyFuture, html_to_text};

/// Upper bound on page text sent to the model.
const MAX_CONTENT_CHARS: usize = 8_000;

static RANGE_IN_REPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,6})\s*[-\u{2013}\u{2014}]{1,2}\s*(\d{1,6})").unwrap());
static SINGLE_IN_REPLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,6})\s*\.?\s*$").unwrap());

const NOT_FOUND_PHRASES: &[&str] = &[
    "not found",
    "no page",
    "not available",
    "cannot find",
    "can't find",
    "unable to",
    "n/a",
    "none",
];

pub struct LlmPageExtractor {
    config: LlmConfig,
}

impl LlmPageExtractor {
    /// Validates the configuration up front so a broken setup is reported
    /// once at startup instead of once per paper.
    pub fn from_config(config: &LlmConfig) -> Result<Self, CoreError> {
        if config
            .api_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty())
        {
            return Err(CoreError::Config("llm api_key is not set".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(CoreError::Config("llm model is not set".to_string()));
        }
        if config.base_url.trim().is_empty() {
            return Err(CoreError::Config("llm base_url is not set".to_string()));
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn ask(
        &self,
        client: &reqwest::Client,
        title: &str,
        venue: Option<&str>,
        content: &str,
    ) -> Result<String, String> {
        let user_prompt = format!(
            "Find the page numbers of the paper titled \"{title}\"{} in the \
             following page content. Reply with only the page range in the \
             form start-end (for example 123-145). If the page numbers are \
             not present, reply exactly: not found\n\n---\n{content}",
            venue
                .map(|v| format!(" (published at {v})"))
                .unwrap_or_default(),
        );
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You extract bibliographic page numbers. Answer with the range only, never with prose.",
                },
                {"role": "user", "content": user_prompt},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let resp = client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&payload)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| format!("llm request: {e}"))?;

        match resp.status().as_u16() {
            401 | 403 => return Err("llm authentication rejected".to_string()),
            429 => return Err("llm rate limited".to_string()),
            s if !(200..300).contains(&s) => return Err(format!("llm status {s}")),
            _ => {}
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("llm body: {e}"))?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "llm reply missing message content".to_string())
    }
}

impl PageStrategy for LlmPageExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a mut ExtractionContext,
        client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> StrategyFuture<'a> {
        Box::pin(async move {
            // Works strictly on what an earlier strategy already downloaded;
            // this strategy never fetches on its own.
            let Some(html) = ctx.fetched_html().map(str::to_string) else {
                return ExtractionOutcome::NoData;
            };
            let text = truncate_chars(&html_to_text(&html), MAX_CONTENT_CHARS);
            if text.trim().is_empty() {
                return ExtractionOutcome::NoData;
            }

            let reply = match self
                .ask(client, &ctx.record.title, ctx.record.venue.as_deref(), &text)
                .await
            {
                Ok(reply) => reply,
                Err(e) => return ExtractionOutcome::Error(e),
            };
            match parse_reply(&reply) {
                Some(pages) => ExtractionOutcome::Pages(pages),
                None => ExtractionOutcome::NoData,
            }
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Strict parsing of the model's reply.
///
/// Accepts `start-end` (hyphen, double hyphen, en or em dash) and a bare
/// single page number. Anything else, including hedged answers and the
/// requested "not found", yields `None`.
fn parse_reply(reply: &str) -> Option<PageRange> {
    let lowered = reply.to_lowercase();
    if NOT_FOUND_PHRASES.iter().any(|p| lowered.contains(p)) {
        return None;
    }
    if let Some(caps) = RANGE_IN_REPLY.captures(reply) {
        let start: u32 = caps.get(1)?.as_str().parse().ok()?;
        let end: u32 = caps.get(2)?.as_str().parse().ok()?;
        return PageRange::span(start, end);
    }
    SINGLE_IN_REPLY
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(PageRange::single)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_range_reply() {
        assert_eq!(parse_reply("5998-6008"), PageRange::span(5998, 6008));
        assert_eq!(parse_reply("  123 \u{2013} 145 "), PageRange::span(123, 145));
        assert_eq!(parse_reply("123--145"), PageRange::span(123, 145));
    }

    #[test]
    fn range_embedded_in_prose() {
        assert_eq!(
            parse_reply("The paper spans pages 770-778."),
            PageRange::span(770, 778)
        );
    }

    #[test]
    fn single_page_reply() {
        assert_eq!(parse_reply("672"), Some(PageRange::single(672)));
        assert_eq!(parse_reply(" 672. "), Some(PageRange::single(672)));
    }

    #[test]
    fn not_found_phrasings() {
        assert_eq!(parse_reply("not found"), None);
        assert_eq!(parse_reply("Not Found."), None);
        assert_eq!(parse_reply("I was unable to locate the page numbers 1-10 style"), None);
        assert_eq!(parse_reply("No page numbers are present."), None);
        assert_eq!(parse_reply("N/A"), None);
    }

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(parse_reply("778-770"), None);
    }

    #[test]
    fn freeform_prose_without_numbers() {
        assert_eq!(parse_reply("The document appears to be an abstract."), None);
    }

    #[test]
    fn config_requires_credentials() {
        let mut config = LlmConfig {
            enabled: true,
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        assert!(LlmPageExtractor::from_config(&config).is_ok());

        config.api_key = Some("   ".to_string());
        assert!(LlmPageExtractor::from_config(&config).is_err());

        config.api_key = None;
        assert!(LlmPageExtractor::from_config(&config).is_err());
    }

    #[test]
    fn config_requires_model_and_base_url() {
        let mut config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        config.model = String::new();
        assert!(LlmPageExtractor::from_config(&config).is_err());

        let mut config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        config.base_url = String::new();
        assert!(LlmPageExtractor::from_config(&config).is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let extractor = LlmPageExtractor::from_config(&LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://api.openai.com/v1/".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(extractor.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn stays_idle_without_a_prior_fetch() {
        let extractor = LlmPageExtractor::from_config(&LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://127.0.0.1:1".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();

        // The record has a URL, but no earlier strategy downloaded it,
        // so there is nothing to send and no download of our own.
        let mut record = crate::CandidateRecord::bare("Attention Is All You Need", "mock");
        record.url = Some("http://127.0.0.1:1/paper".to_string());
        let mut ctx = ExtractionContext::new(record);

        let client = reqwest::Client::new();
        let outcome = extractor
            .attempt(&mut ctx, &client, Duration::from_secs(1))
            .await;
        assert_eq!(outcome, ExtractionOutcome::NoData);
        assert!(ctx.fetched_html().is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "\u{e9}".repeat(10);
        assert_eq!(truncate_chars(&text, 4).chars().count(), 4);
    }
}
