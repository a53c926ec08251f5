//! Data models for alert links, extracted articles and the output report.
//!
//! Items flow through these types strictly in one direction:
//! - [`CandidateLink`]: an anchor found in an alert email, plus where it resolved to
//! - [`ArticleRecord`]: title and body extracted from one unique resolved URL
//! - [`ReportRow`]: an article together with its summary and summary status
//! - [`ReportTable`]: the ordered rows written to the spreadsheet
//!
//! None of them is mutated after construction. A row's summary is filled by
//! building a new, terminal row from a pending one.

use serde::Serialize;

/// Body text stored for an article whose page could not be extracted.
pub const EXTRACTION_FAILED: &str = "extraction failed";

/// Title used when none could be recovered from the page.
pub const UNKNOWN_TITLE: &str = "Title unavailable";

/// Summary written for rows that were never sent to the summarizer.
pub const SKIPPED_SUMMARY: &str = "Summary unavailable: article could not be extracted";

/// A hyperlink found in an alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// The `href` exactly as it appeared in the email.
    pub original_href: String,
    /// The canonical destination, or `None` if resolution failed.
    pub resolved_url: Option<String>,
}

impl CandidateLink {
    pub fn resolved(original_href: impl Into<String>, resolved_url: impl Into<String>) -> Self {
        Self {
            original_href: original_href.into(),
            resolved_url: Some(resolved_url.into()),
        }
    }

    pub fn unresolved(original_href: impl Into<String>) -> Self {
        Self {
            original_href: original_href.into(),
            resolved_url: None,
        }
    }
}

/// Whether the extractor recovered real article text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractStatus {
    Ok,
    ExtractFailed,
}

/// Title and main text of one article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRecord {
    pub url: String,
    pub title: String,
    pub body: String,
    pub status: ExtractStatus,
}

impl ArticleRecord {
    pub fn extracted(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            status: ExtractStatus::Ok,
        }
    }

    /// A record carrying the sentinel body. `title` is whatever could be
    /// recovered before the failure, if anything.
    pub fn failed(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            body: EXTRACTION_FAILED.to_string(),
            status: ExtractStatus::ExtractFailed,
        }
    }

    /// True if the body is the extraction-failure sentinel, regardless of how
    /// the record was built.
    pub fn has_sentinel_body(&self) -> bool {
        self.body == EXTRACTION_FAILED
    }
}

/// Progress of a row through the summarizing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    Pending,
    Ok,
    Skipped,
    Failed,
}

impl SummaryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SummaryStatus::Pending)
    }
}

/// One line of the output spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub url: String,
    pub title: String,
    pub body: String,
    pub summary: Option<String>,
    pub summary_status: SummaryStatus,
}

impl ReportRow {
    /// A row that has not been through the summarizer yet.
    pub fn pending(article: ArticleRecord) -> Self {
        Self {
            url: article.url,
            title: article.title,
            body: article.body,
            summary: None,
            summary_status: SummaryStatus::Pending,
        }
    }

    pub fn summarized(self, summary: String) -> Self {
        Self {
            summary: Some(summary),
            summary_status: SummaryStatus::Ok,
            ..self
        }
    }

    pub fn skipped(self) -> Self {
        Self {
            summary: Some(SKIPPED_SUMMARY.to_string()),
            summary_status: SummaryStatus::Skipped,
            ..self
        }
    }

    pub fn failed(self) -> Self {
        Self {
            summary: None,
            summary_status: SummaryStatus::Failed,
            ..self
        }
    }

    pub fn needs_summary(&self) -> bool {
        self.body != EXTRACTION_FAILED
    }
}

/// The ordered set of rows produced by one run.
///
/// Only terminal rows are accepted, so a persisted table never contains a
/// `Pending` status.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished row. A pending row is recorded as failed.
    pub fn push(&mut self, row: ReportRow) {
        let row = if row.summary_status.is_terminal() {
            row
        } else {
            row.failed()
        };
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, status: SummaryStatus) -> usize {
        self.rows
            .iter()
            .filter(|r| r.summary_status == status)
            .count()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Partial,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Partial => "partial",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(body: &str) -> ArticleRecord {
        ArticleRecord::extracted("https://example.com/a", "A title", body)
    }

    #[test]
    fn test_failed_record_uses_sentinel_and_placeholder_title() {
        let record = ArticleRecord::failed("https://example.com/x", None);
        assert_eq!(record.body, EXTRACTION_FAILED);
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.status, ExtractStatus::ExtractFailed);
        assert!(record.has_sentinel_body());
    }

    #[test]
    fn test_failed_record_keeps_recovered_title() {
        let record = ArticleRecord::failed("https://example.com/x", Some("Headline".to_string()));
        assert_eq!(record.title, "Headline");

        let record = ArticleRecord::failed("https://example.com/x", Some("   ".to_string()));
        assert_eq!(record.title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_row_transitions() {
        let row = ReportRow::pending(article("Body text"));
        assert_eq!(row.summary_status, SummaryStatus::Pending);
        assert!(row.needs_summary());

        let done = row.clone().summarized("Short".to_string());
        assert_eq!(done.summary.as_deref(), Some("Short"));
        assert_eq!(done.summary_status, SummaryStatus::Ok);

        let skipped = row.clone().skipped();
        assert_eq!(skipped.summary.as_deref(), Some(SKIPPED_SUMMARY));
        assert_eq!(skipped.summary_status, SummaryStatus::Skipped);

        let failed = row.failed();
        assert_eq!(failed.summary, None);
        assert_eq!(failed.summary_status, SummaryStatus::Failed);
    }

    #[test]
    fn test_sentinel_row_does_not_need_summary() {
        let row = ReportRow::pending(ArticleRecord::failed("https://example.com/x", None));
        assert!(!row.needs_summary());
    }

    #[test]
    fn test_table_never_holds_pending_rows() {
        let mut table = ReportTable::new();
        table.push(ReportRow::pending(article("one")).summarized("s".to_string()));
        table.push(ReportRow::pending(article("two")));

        assert_eq!(table.len(), 2);
        assert!(table.rows().iter().all(|r| r.summary_status.is_terminal()));
        assert_eq!(table.count(SummaryStatus::Ok), 1);
        assert_eq!(table.count(SummaryStatus::Failed), 1);
        assert_eq!(table.count(SummaryStatus::Pending), 0);
    }

    #[test]
    fn test_table_serializes_statuses() {
        let mut table = ReportTable::new();
        table.push(ReportRow::pending(article("one")).skipped());
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"SKIPPED\""));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RunOutcome::Completed.to_string(), "completed");
        assert_eq!(RunOutcome::Partial.to_string(), "partial");
    }
}
