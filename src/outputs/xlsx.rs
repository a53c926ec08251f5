//! Spreadsheet output for the report table.
//!
//! One header row followed by one row per [`ReportRow`] in collection order.
//! Every cell is stripped of the control characters the xlsx format rejects
//! and cut to the per-cell length limit.

use crate::config::OutputConfig;
use crate::error::PipelineError;
use crate::models::{ReportTable, RunOutcome};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Largest number of characters a single xlsx cell may hold.
pub const MAX_CELL_CHARS: usize = 32_767;

/// C0 control characters other than tab, line feed and carriage return.
static ILLEGAL_CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").unwrap());

/// Remove control characters that are illegal in a spreadsheet cell.
/// Newlines, carriage returns and tabs are kept.
pub fn sanitize_cell(text: &str) -> String {
    ILLEGAL_CONTROL.replace_all(text, "").into_owned()
}

fn cell_text(text: &str) -> String {
    let clean = sanitize_cell(text);
    if clean.chars().count() > MAX_CELL_CHARS {
        clean.chars().take(MAX_CELL_CHARS).collect()
    } else {
        clean
    }
}

/// Writes the finished table somewhere the notifier can attach it from.
pub trait ReportSink {
    /// Persist `table` under the name for `outcome`, returning where it went.
    fn persist(&self, table: &ReportTable, outcome: RunOutcome) -> Result<PathBuf, PipelineError>;
}

/// Writes `.xlsx` workbooks into a fixed directory.
#[derive(Debug, Clone)]
pub struct XlsxReport {
    dir: PathBuf,
    complete_name: String,
    partial_name: String,
    headers: [String; 4],
}

impl XlsxReport {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            complete_name: config.complete_name.clone(),
            partial_name: config.partial_name.clone(),
            headers: config.headers.clone(),
        }
    }

    pub fn path_for(&self, outcome: RunOutcome) -> PathBuf {
        match outcome {
            RunOutcome::Completed => self.dir.join(&self.complete_name),
            RunOutcome::Partial => self.dir.join(&self.partial_name),
        }
    }

    fn write_workbook(&self, table: &ReportTable, path: &Path) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();

        for (col, header) in self.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header.as_str(), &bold)?;
        }
        worksheet.set_column_width(0, 50)?;
        worksheet.set_column_width(1, 40)?;
        worksheet.set_column_width(2, 80)?;
        worksheet.set_column_width(3, 80)?;

        for (i, row) in table.rows().iter().enumerate() {
            let r = (i + 1) as u32;
            worksheet.write_string(r, 0, cell_text(&row.url))?;
            worksheet.write_string(r, 1, cell_text(&row.title))?;
            worksheet.write_string(r, 2, cell_text(&row.body))?;
            if let Some(summary) = &row.summary {
                worksheet.write_string(r, 3, cell_text(summary))?;
            }
        }

        workbook.save(path)
    }
}

impl ReportSink for XlsxReport {
    #[instrument(level = "info", skip_all, fields(%outcome, rows = table.len()))]
    fn persist(&self, table: &ReportTable, outcome: RunOutcome) -> Result<PathBuf, PipelineError> {
        let path = self.path_for(outcome);
        let fail = |reason: String| PipelineError::Persist {
            path: path.clone(),
            reason,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| fail(e.to_string()))?;
        self.write_workbook(table, &path)
            .map_err(|e| fail(e.to_string()))?;

        info!(path = %path.display(), "Wrote report workbook");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, ReportRow};

    #[test]
    fn test_sanitize_strips_illegal_controls_and_keeps_newlines() {
        let dirty = "a\u{0}b\u{8}c\u{B}d\u{C}e\u{1F}f\ng\r\nh\ti";
        assert_eq!(sanitize_cell(dirty), "abcdef\ng\r\nh\ti");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "plain text",
            "line one\nline two",
            "\u{1}\u{2}\u{3}mixed\u{E}\n\u{10}",
            "",
            "中文\u{7}內容",
        ];
        for s in samples {
            let once = sanitize_cell(s);
            assert_eq!(sanitize_cell(&once), once);
            assert_eq!(
                once.matches('\n').count(),
                s.matches('\n').count(),
                "newlines must survive: {s:?}"
            );
        }
    }

    #[test]
    fn test_cell_text_truncates_to_limit() {
        let long = "x".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(cell_text(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(cell_text("short"), "short");
    }

    fn sample_table() -> ReportTable {
        let mut table = ReportTable::new();
        table.push(
            ReportRow::pending(ArticleRecord::extracted(
                "https://news.example/a",
                "Title\u{0}A",
                "Body with\na newline",
            ))
            .summarized("Summary".to_string()),
        );
        table.push(ReportRow::pending(ArticleRecord::failed("https://news.example/b", None)).skipped());
        table
    }

    #[test]
    fn test_persist_uses_outcome_specific_names() {
        let tmp = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: tmp.path().join("out"),
            ..OutputConfig::default()
        };
        let sink = XlsxReport::new(&config);
        let table = sample_table();

        let complete = sink.persist(&table, RunOutcome::Completed).unwrap();
        assert_eq!(complete, tmp.path().join("out").join("alert-digest.xlsx"));
        let bytes = std::fs::read(&complete).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let partial = sink.persist(&table, RunOutcome::Partial).unwrap();
        assert_eq!(
            partial,
            tmp.path().join("out").join("alert-digest-partial.xlsx")
        );
        assert!(partial.exists());
    }

    #[test]
    fn test_persist_reports_unwritable_target() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let config = OutputConfig {
            dir: blocker,
            ..OutputConfig::default()
        };
        let err = XlsxReport::new(&config)
            .persist(&sample_table(), RunOutcome::Completed)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Persist { .. }));
    }
}
