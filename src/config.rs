//! Run configuration loaded from a YAML file.
//!
//! Every field has a default, so an empty file (or a file that only lists
//! notification recipients) is a valid configuration. Secrets are not read
//! from this file; they come from the CLI or its environment variables.
//!
//! ```yaml
//! prompt_path: prompt/news_digest.md
//! mailbox:
//!   subjects: ["Google Alert", "Google 快訊"]
//!   since: 2026-10-01
//! output:
//!   dir: output
//! pipeline:
//!   pacing_secs: 5
//! llm:
//!   model: gpt-4o-mini
//! notify:
//!   smtp_host: smtp.gmail.com
//!   smtp_user: alerts@example.com
//!   from: Alert Digest <alerts@example.com>
//!   recipients:
//!     - editor@example.com
//!     - analyst@example.com
//! ```

use crate::error::PipelineError;
use chrono::NaiveDate;
use lettre::message::Mailbox;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prompt template sent with every summarizer call.
    pub prompt_path: PathBuf,
    pub mailbox: MailboxConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub notify: NotifyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompt_path: PathBuf::from("prompt/news_digest.md"),
            mailbox: MailboxConfig::default(),
            output: OutputConfig::default(),
            pipeline: PipelineConfig::default(),
            llm: LlmConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

/// Which exported messages count as alert emails.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// A message is kept if its subject contains any of these (case-insensitive).
    /// An empty list keeps every message.
    pub subjects: Vec<String>,
    /// First day (UTC) of the accepted date window.
    pub since: Option<NaiveDate>,
    /// Last day (UTC) of the accepted date window, inclusive.
    pub until: Option<NaiveDate>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            subjects: vec!["Google Alert".to_string(), "Google 快訊".to_string()],
            since: None,
            until: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File name used when every row was processed.
    pub complete_name: String,
    /// File name used when summarization aborted early.
    pub partial_name: String,
    /// Column headers for URL, title, article and summary, in that order.
    pub headers: [String; 4],
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            complete_name: "alert-digest.xlsx".to_string(),
            partial_name: "alert-digest-partial.xlsx".to_string(),
            headers: [
                "URL".to_string(),
                "Title".to_string(),
                "Article".to_string(),
                "Summary".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wait after every successful summarizer call.
    pub pacing_secs: u64,
    /// Upper bound for each fetch, redirect chain and summarizer call.
    pub request_timeout_secs: u64,
    /// Links whose resolved URL contains any of these are never extracted.
    pub video_markers: Vec<String>,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_secs: 5,
            request_timeout_secs: 30,
            video_markers: vec![
                "youtube".to_string(),
                "youtu.be".to_string(),
                "vimeo.com".to_string(),
            ],
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base of an OpenAI-compatible API; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub smtp_host: String,
    pub smtp_user: String,
    pub from: String,
    /// Every address here receives its own copy of the report.
    pub recipients: Vec<String>,
    pub complete_subject: String,
    pub complete_body: String,
    pub partial_subject: String,
    pub partial_body: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_user: String::new(),
            from: String::new(),
            recipients: Vec::new(),
            complete_subject: "News alert digest".to_string(),
            complete_body: "The news alert digest is attached.".to_string(),
            partial_subject: "News alert digest (partial)".to_string(),
            partial_body: "Summarization stopped early, so only a partial news alert digest \
                           was produced. It is attached."
                .to_string(),
        }
    }
}

impl NotifyConfig {
    /// Check that mail can be sent with these settings and `password`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Invalid`] when the SMTP account, password or recipient
    /// list is empty, or when `from` or any recipient is not a valid mailbox.
    pub fn validate(&self, password: &str) -> Result<(), PipelineError> {
        let invalid = |reason: String| -> Result<(), PipelineError> {
            Err(PipelineError::Invalid { reason })
        };

        if self.smtp_host.trim().is_empty() || self.smtp_user.trim().is_empty() {
            return invalid("notify.smtp_host and notify.smtp_user are required".to_string());
        }
        if password.trim().is_empty() {
            return invalid("SMTP password is missing (set SMTP_PASSWORD or --smtp-password)".to_string());
        }
        if self.recipients.is_empty() {
            return invalid("notify.recipients is empty".to_string());
        }
        if let Err(e) = self.from.parse::<Mailbox>() {
            return invalid(format!("notify.from `{}` is not an address: {e}", self.from));
        }
        for recipient in &self.recipients {
            if let Err(e) = recipient.parse::<Mailbox>() {
                return invalid(format!("recipient `{recipient}` is not an address: {e}"));
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Read and parse a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            recipients = config.notify.recipients.len(),
            model = %config.llm.model,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Check everything the run needs before any network call is made.
    ///
    /// # Arguments
    ///
    /// * `llm_api_key` - key for the chat completions endpoint
    /// * `smtp_password` - password for `notify.smtp_user`; only checked when `notify` is set
    /// * `notify` - whether the run will send mail
    ///
    /// # Errors
    ///
    /// [`PipelineError::Invalid`] naming the first missing or malformed setting.
    pub fn validate(
        &self,
        llm_api_key: Option<&str>,
        smtp_password: Option<&str>,
        notify: bool,
    ) -> Result<(), PipelineError> {
        let invalid = |reason: String| -> Result<(), PipelineError> {
            Err(PipelineError::Invalid { reason })
        };

        if llm_api_key.is_none_or(|key| key.trim().is_empty()) {
            return invalid("LLM API key is missing (set LLM_API_KEY or --llm-api-key)".to_string());
        }
        if let (Some(since), Some(until)) = (self.mailbox.since, self.mailbox.until) {
            if since > until {
                return invalid(format!("mailbox.since {since} is after mailbox.until {until}"));
            }
        }
        if !notify {
            return Ok(());
        }

        self.notify.validate(smtp_password.unwrap_or_default())
    }

    /// Load the prompt template once for the whole run.
    pub fn load_prompt(&self) -> Result<String, PipelineError> {
        std::fs::read_to_string(&self.prompt_path).map_err(|source| PipelineError::Read {
            path: self.prompt_path.clone(),
            source,
        })
    }
}
