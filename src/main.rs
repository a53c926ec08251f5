//! # Alert Digest
//!
//! Turns a batch of news-alert emails into a summarized spreadsheet.
//!
//! ## Usage
//!
//! ```sh
//! alert_digest -i ./inbox -c config.yaml
//! ```
//!
//! ## Architecture
//!
//! One sequential pass, no state kept between runs:
//! 1. **Collecting**: read the alert emails and pull out their links
//! 2. **Resolving**: follow redirect wrappers, drop failures, duplicates and video links
//! 3. **Extracting**: fetch each article and isolate its title and text
//! 4. **Summarizing**: one LLM call per article, paced to respect rate limits
//! 5. **Output**: write the spreadsheet (complete or partial) and email it

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod dedup;
mod error;
mod extractor;
mod mailbox;
mod models;
mod outputs;
mod pipeline;
mod resolver;
mod utils;

use api::{ChatCompletionSummarizer, TimeBoxed};
use cli::Cli;
use config::AppConfig;
use extractor::HttpExtractor;
use outputs::notify::{Notifier, SmtpNotifier};
use outputs::xlsx::XlsxReport;
use pipeline::{Pipeline, PipelinePolicy};
use resolver::HttpResolver;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("alert_digest starting up");

    let args = Cli::parse();
    debug!(inbox = %args.inbox.display(), config = %args.config.display(), "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = AppConfig::load(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if args.since.is_some() {
        config.mailbox.since = args.since;
    }
    if args.until.is_some() {
        config.mailbox.until = args.until;
    }
    config.validate(
        args.llm_api_key.as_deref(),
        args.smtp_password.as_deref(),
        !args.no_notify,
    )?;
    ensure_writable_dir(&config.output.dir).await?;

    let prompt = config.load_prompt()?;
    info!(path = %config.prompt_path.display(), chars = prompt.chars().count(), "Loaded prompt template");

    // ---- Collaborators ----
    let timeout = config.pipeline.request_timeout();
    let user_agent = config.pipeline.user_agent.as_str();
    let resolver = HttpResolver::new(timeout, user_agent)?;
    let extractor = HttpExtractor::new(timeout, user_agent)?;
    let summarizer = TimeBoxed::new(
        ChatCompletionSummarizer::new(&config.llm, args.llm_api_key.unwrap_or_default())?,
        timeout,
    );
    let sink = XlsxReport::new(&config.output);
    let notifier = if args.no_notify {
        Notifier::Disabled
    } else {
        Notifier::Smtp(SmtpNotifier::new(
            config.notify.clone(),
            args.smtp_password.unwrap_or_default(),
        )?)
    };
    let policy = PipelinePolicy {
        pacing: config.pipeline.pacing(),
        video_markers: config.pipeline.video_markers.clone(),
    };

    // ---- Run ----
    let emails = mailbox::read_inbox(&args.inbox, &config.mailbox).await?;
    let pipeline = Pipeline::new(resolver, extractor, summarizer, sink, notifier, policy);
    let summary = pipeline.run(&emails, &prompt).await?;

    let elapsed = start_time.elapsed();
    info!(
        outcome = %summary.outcome,
        rows = summary.rows,
        report = %summary.report_path.display(),
        ?elapsed,
        secs = elapsed.as_secs(),
        "Execution complete"
    );

    Ok(())
}
