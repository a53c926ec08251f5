//! The digest run, from alert emails to a delivered spreadsheet.
//!
//! A run moves through [`Stage`]s in a fixed order:
//!
//! ```text
//! Collecting -> Resolving -> Extracting -> Summarizing -> Completed | Partial
//! ```
//!
//! Everything is sequential. Link and article failures are absorbed per item;
//! the first summarizer failure ends summarization for the rest of the run,
//! the remaining rows are marked failed and the partial report is delivered.

use crate::api::{Summarize, SummaryOutcome, summarize_step};
use crate::dedup::{unique_bodies, unique_links};
use crate::error::PipelineError;
use crate::extractor::Extract;
use crate::mailbox::AlertEmail;
use crate::models::{ArticleRecord, CandidateLink, ReportRow, ReportTable, RunOutcome, SummaryStatus};
use crate::outputs::notify::Notify;
use crate::outputs::xlsx::ReportSink;
use crate::resolver::Resolve;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collecting,
    Resolving,
    Extracting,
    Summarizing,
    Completed,
    Partial,
}

/// Scheduling and filtering rules for a run.
#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    /// Wait after each successful summarizer call.
    pub pacing: Duration,
    /// Substrings that mark a resolved URL as a video page.
    pub video_markers: Vec<String>,
}

impl PipelinePolicy {
    pub fn is_video(&self, url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        self.video_markers
            .iter()
            .any(|m| url.contains(&m.to_ascii_lowercase()))
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub report_path: PathBuf,
    pub rows: usize,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Pipeline<R, E, S, W, N> {
    resolver: R,
    extractor: E,
    summarizer: S,
    sink: W,
    notifier: N,
    policy: PipelinePolicy,
}

fn enter(stage: Stage) {
    info!(?stage, "Entering stage");
}

impl<R, E, S, W, N> Pipeline<R, E, S, W, N>
where
    R: Resolve,
    E: Extract,
    S: Summarize,
    W: ReportSink,
    N: Notify,
{
    pub fn new(
        resolver: R,
        extractor: E,
        summarizer: S,
        sink: W,
        notifier: N,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            resolver,
            extractor,
            summarizer,
            sink,
            notifier,
            policy,
        }
    }

    /// Run every stage, persist the table and send exactly one notification.
    ///
    /// # Arguments
    ///
    /// * `emails` - the alert emails collected for this run
    /// * `prompt` - the prompt template passed unchanged to every summarizer call
    ///
    /// # Returns
    ///
    /// A [`RunSummary`] with the outcome (`Completed`, or `Partial` after a
    /// summarizer failure), the row count and the path the report was written to.
    /// A summarizer failure is not an error: the rows gathered so far are still
    /// persisted and sent.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Persist`] if the report cannot be written (the table is
    /// dumped to the log first), or [`PipelineError::Notify`] if a recipient
    /// cannot be mailed.
    #[instrument(level = "info", skip_all, fields(emails = emails.len()))]
    pub async fn run(&self, emails: &[AlertEmail], prompt: &str) -> Result<RunSummary, PipelineError> {
        let hrefs = self.collect(emails);
        let links = self.resolve_links(hrefs).await;
        let articles = self.extract_articles(links).await;
        let (table, outcome) = self.summarize_rows(articles, prompt).await;
        self.deliver(table, outcome).await
    }

    fn collect(&self, emails: &[AlertEmail]) -> Vec<String> {
        enter(Stage::Collecting);
        let hrefs: Vec<String> = emails
            .iter()
            .flat_map(|e| e.hrefs.iter().cloned())
            .unique()
            .collect();
        info!(emails = emails.len(), links = hrefs.len(), "Collected candidate links");
        hrefs
    }

    async fn resolve_links(&self, hrefs: Vec<String>) -> Vec<CandidateLink> {
        enter(Stage::Resolving);
        let total = hrefs.len();
        let resolver = &self.resolver;

        let candidates: Vec<CandidateLink> = stream::iter(hrefs)
            .then(move |href| async move {
                match resolver.resolve(&href).await {
                    Ok(url) => {
                        debug!(%href, %url, "Resolved link");
                        CandidateLink::resolved(href, url)
                    }
                    Err(e) => {
                        debug!(%href, error = %e, "Dropping unresolvable link");
                        CandidateLink::unresolved(href)
                    }
                }
            })
            .collect()
            .await;

        let (videos, links): (Vec<_>, Vec<_>) = unique_links(candidates)
            .into_iter()
            .partition(|l| l.resolved_url.as_deref().is_some_and(|u| self.policy.is_video(u)));
        for video in &videos {
            info!(url = ?video.resolved_url, "Skipping video link");
        }

        info!(
            total,
            unique = links.len(),
            videos = videos.len(),
            "Resolved candidate links"
        );
        links
    }

    async fn extract_articles(&self, links: Vec<CandidateLink>) -> Vec<ArticleRecord> {
        enter(Stage::Extracting);
        let mut articles = Vec::with_capacity(links.len());

        for url in links.into_iter().filter_map(|l| l.resolved_url) {
            info!(%url, "Extracting article");
            let record = match self.extractor.extract(&url).await {
                Ok(record) => record,
                Err(e) => {
                    error!(%url, error = %e, "Extractor error; keeping item as failed");
                    ArticleRecord::failed(url.as_str(), None)
                }
            };
            articles.push(record);
        }

        let extracted = articles.len();
        let failed = articles.iter().filter(|a| a.has_sentinel_body()).count();
        let articles = unique_bodies(articles);
        info!(
            extracted,
            failed,
            unique = articles.len(),
            "Extracted articles"
        );
        articles
    }

    async fn summarize_rows(
        &self,
        articles: Vec<ArticleRecord>,
        prompt: &str,
    ) -> (ReportTable, RunOutcome) {
        enter(Stage::Summarizing);
        let total = articles.len();
        let mut pending = articles.into_iter().map(ReportRow::pending);
        let mut table = ReportTable::new();
        let mut outcome = RunOutcome::Completed;

        for row in pending.by_ref() {
            let index = table.len() + 1;
            if !row.needs_summary() {
                info!(index, total, url = %row.url, "No article text; skipping summary");
                table.push(row.skipped());
                continue;
            }

            info!(index, total, url = %row.url, "Generating summary");
            match summarize_step(&self.summarizer, prompt, &row.body).await {
                SummaryOutcome::Ok(summary) => {
                    debug!(index, summary = %truncate_for_log(&summary, 200), "Summary");
                    table.push(row.summarized(summary));
                    sleep(self.policy.pacing).await;
                }
                SummaryOutcome::Fatal(reason) => {
                    warn!(index, url = %row.url, %reason, "Summarizer failed; abandoning remaining rows");
                    table.push(row.failed());
                    outcome = RunOutcome::Partial;
                    break;
                }
            }
        }

        for row in pending {
            table.push(row.failed());
        }
        (table, outcome)
    }

    async fn deliver(
        &self,
        table: ReportTable,
        outcome: RunOutcome,
    ) -> Result<RunSummary, PipelineError> {
        enter(match outcome {
            RunOutcome::Completed => Stage::Completed,
            RunOutcome::Partial => Stage::Partial,
        });

        if table.is_empty() {
            warn!("No articles survived collection; writing an empty report");
        }

        let report_path = match self.sink.persist(&table, outcome) {
            Ok(path) => path,
            Err(e) => {
                let dump = serde_json::to_string(&table)
                    .unwrap_or_else(|je| format!("<table not serializable: {je}>"));
                error!(error = %e, %outcome, table = %dump, "Report could not be persisted");
                return Err(e);
            }
        };

        self.notifier.notify(outcome, &report_path).await?;

        let summary = RunSummary {
            outcome,
            report_path,
            rows: table.len(),
            ok: table.count(SummaryStatus::Ok),
            skipped: table.count(SummaryStatus::Skipped),
            failed: table.count(SummaryStatus::Failed),
        };
        info!(
            %outcome,
            rows = summary.rows,
            ok = summary.ok,
            skipped = summary.skipped,
            failed = summary.failed,
            path = %summary.report_path.display(),
            "Run finished"
        );
        Ok(summary)
    }
}
