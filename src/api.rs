//! LLM summarizer adapter.
//!
//! The summarizer is a slow, rate-limited remote call. This module does not
//! retry and does not pace: a failed call is reported once and the
//! orchestrator decides what it means for the run.
//!
//! # Architecture
//!
//! - [`Summarize`]: core trait, prompt template plus article text in, summary out
//! - [`ChatCompletionSummarizer`]: OpenAI-compatible `/chat/completions` client
//! - [`TimeBoxed`]: decorator that bounds any [`Summarize`] call with a timeout
//! - [`summarize_step`]: folds a call into the tagged [`SummaryOutcome`]

use crate::config::LlmConfig;
use crate::error::SummarizeError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

/// Trait for generating a summary of one article.
pub trait Summarize {
    /// Send the prompt template and article text, return the generated summary.
    ///
    /// # Arguments
    ///
    /// * `prompt_template` - instructions shared by every call of the run
    /// * `article_text` - the extracted body of one article
    ///
    /// # Errors
    ///
    /// A [`SummarizeError`] for transport failures, non-success statuses,
    /// responses without a usable completion, and timeouts.
    async fn summarize(
        &self,
        prompt_template: &str,
        article_text: &str,
    ) -> Result<String, SummarizeError>;
}

/// Result of one summarizer step as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Ok(String),
    /// The run cannot continue summarizing; carries the reason for the log.
    Fatal(String),
}

/// Call `summarizer` once and classify the result.
///
/// # Arguments
///
/// * `summarizer` - the summarization backend
/// * `prompt_template` - instructions shared by every call of the run
/// * `article_text` - the extracted body of one article
///
/// # Returns
///
/// [`SummaryOutcome::Ok`] with the summary text, or [`SummaryOutcome::Fatal`]
/// with the error message. Every error is fatal to the run; nothing is retried.
#[instrument(level = "info", skip_all)]
pub async fn summarize_step<S: Summarize>(
    summarizer: &S,
    prompt_template: &str,
    article_text: &str,
) -> SummaryOutcome {
    let t0 = Instant::now();
    let res = summarizer.summarize(prompt_template, article_text).await;
    let dt = t0.elapsed();

    match res {
        Ok(summary) => {
            info!(
                elapsed_ms = dt.as_millis(),
                chars = summary.chars().count(),
                "Summary generated"
            );
            SummaryOutcome::Ok(summary)
        }
        Err(e) => {
            error!(elapsed_ms = dt.as_millis(), error = %e, "Summarizer call failed");
            SummaryOutcome::Fatal(e.to_string())
        }
    }
}

/// Decorator that fails any call taking longer than `limit`.
pub struct TimeBoxed<T> {
    inner: T,
    limit: Duration,
}

impl<T> TimeBoxed<T> {
    pub fn new(inner: T, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

impl<T> fmt::Debug for TimeBoxed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeBoxed")
            .field("limit", &self.limit)
            .finish()
    }
}

impl<T: Summarize> Summarize for TimeBoxed<T> {
    async fn summarize(
        &self,
        prompt_template: &str,
        article_text: &str,
    ) -> Result<String, SummarizeError> {
        tokio::time::timeout(
            self.limit,
            self.inner.summarize(prompt_template, article_text),
        )
        .await
        .map_err(|_| SummarizeError::Timeout(self.limit))?
    }
}

/// Client for any OpenAI-compatible chat completions endpoint.
///
/// The prompt template goes in the system message and the article text in
/// the user message.
pub struct ChatCompletionSummarizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl fmt::Debug for ChatCompletionSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionSummarizer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionSummarizer {
    /// Build a client for the `/chat/completions` endpoint under `config.base_url`.
    ///
    /// # Arguments
    ///
    /// * `config` - endpoint, model and sampling settings
    /// * `api_key` - sent as a bearer token on every request
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn headers(&self) -> Result<HeaderMap, SummarizeError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| SummarizeError::Malformed("invalid API key header".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl Summarize for ChatCompletionSummarizer {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn summarize(
        &self,
        prompt_template: &str,
        article_text: &str,
    ) -> Result<String, SummarizeError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt_template,
                },
                ChatMessage {
                    role: "user",
                    content: article_text,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SummarizeError::Status {
                status,
                body: truncate_for_log(&text, 300),
            });
        }

        let raw = resp.text().await?;
        debug!(response_preview = %truncate_for_log(&raw, 300), "Chat completion response");
        extract_summary(&raw)
    }
}

/// Pull the first non-empty assistant message out of a response body.
pub fn extract_summary(raw: &str) -> Result<String, SummarizeError> {
    let parsed: ChatResponse =
        serde_json::from_str(raw).map_err(|e| SummarizeError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
        .ok_or_else(|| SummarizeError::Malformed("no summary in response".to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, &'static str>);

    impl Summarize for Fixed {
        async fn summarize(&self, _: &str, _: &str) -> Result<String, SummarizeError> {
            match self.0 {
                Ok(s) => Ok(s.to_string()),
                Err(reason) => Err(SummarizeError::Malformed(reason.to_string())),
            }
        }
    }

    struct Hangs;

    impl Summarize for Hangs {
        async fn summarize(&self, _: &str, _: &str) -> Result<String, SummarizeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    #[test]
    fn test_extract_summary_takes_first_non_empty_choice() {
        let raw = r#"{"choices":[
            {"message":{"role":"assistant","content":"  "}},
            {"message":{"role":"assistant","content":" A short summary. "}}
        ]}"#;
        assert_eq!(extract_summary(raw).unwrap(), "A short summary.");
    }

    #[test]
    fn test_extract_summary_rejects_malformed_and_empty() {
        assert!(matches!(
            extract_summary("{\"choices\": ["),
            Err(SummarizeError::Malformed(_))
        ));
        assert!(matches!(
            extract_summary(r#"{"choices":[]}"#),
            Err(SummarizeError::Malformed(_))
        ));
        assert!(matches!(
            extract_summary(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(SummarizeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_step_tags_outcomes() {
        let ok = summarize_step(&Fixed(Ok("summary")), "prompt", "text").await;
        assert_eq!(ok, SummaryOutcome::Ok("summary".to_string()));

        let fatal = summarize_step(&Fixed(Err("boom")), "prompt", "text").await;
        assert!(matches!(fatal, SummaryOutcome::Fatal(reason) if reason.contains("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_boxed_turns_hang_into_timeout() {
        let boxed = TimeBoxed::new(Hangs, Duration::from_secs(30));
        let err = boxed.summarize("prompt", "text").await.unwrap_err();
        assert!(matches!(err, SummarizeError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_time_boxed_passes_through_fast_calls() {
        let boxed = TimeBoxed::new(Fixed(Ok("quick")), Duration::from_secs(30));
        assert_eq!(boxed.summarize("p", "t").await.unwrap(), "quick");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..LlmConfig::default()
        };
        let summarizer = ChatCompletionSummarizer::new(&config, "key".to_string()).unwrap();
        assert_eq!(summarizer.endpoint, "http://localhost:11434/v1/chat/completions");
    }
}
