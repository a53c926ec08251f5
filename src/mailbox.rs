//! Alert email intake.
//!
//! Searching and downloading mail is left to whatever fills the inbox
//! directory; this module reads the exported messages and pulls the anchors
//! out of their HTML bodies. Full `.eml` messages are MIME-decoded and
//! filtered by subject and date; bare `.html` bodies carry no headers and are
//! always read.

use chrono::{DateTime, NaiveDate};
use mail_parser::{MessageParser, PartType};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use itertools::Itertools;

use crate::config::MailboxConfig;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// The links found in one alert email, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    /// Identifies the email in logs (the exported file name).
    pub id: String,
    pub hrefs: Vec<String>,
}

impl AlertEmail {
    pub fn from_html(id: impl Into<String>, html: &str) -> Self {
        Self {
            id: id.into(),
            hrefs: anchors_in(html),
        }
    }
}

/// Why an exported message was left out of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    NotMime,
    Subject(String),
    Undated,
    OutsideWindow(NaiveDate),
    NoHtmlBody,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::NotMime => write!(f, "not a MIME message"),
            Skip::Subject(s) => write!(f, "subject `{s}` is not an alert"),
            Skip::Undated => write!(f, "no usable Date header"),
            Skip::OutsideWindow(d) => write!(f, "dated {d}, outside the date window"),
            Skip::NoHtmlBody => write!(f, "no text/html part"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Eml,
    Html,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "eml" => Some(Format::Eml),
        "html" | "htm" => Some(Format::Html),
        _ => None,
    }
}

/// Every usable `href` in an HTML email body, first occurrence only.
pub fn anchors_in(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(str::to_string)
        .unique()
        .collect()
}

fn subject_matches(subject: &str, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let subject = subject.to_lowercase();
    wanted.iter().any(|w| subject.contains(&w.to_lowercase()))
}

/// Decode one RFC 5322 message and keep it only if it is an alert inside the
/// configured window. Transfer encodings (quoted-printable, base64) and
/// encoded-word subjects are undone before anything is matched.
///
/// # Arguments
///
/// * `id` - name used for the email in logs
/// * `raw` - the message as exported, headers included
/// * `filter` - subject list and optional date window
///
/// # Returns
///
/// The links of the first `text/html` part.
///
/// # Errors
///
/// A [`Skip`] saying which check the message failed.
pub fn parse_eml(id: &str, raw: &[u8], filter: &MailboxConfig) -> Result<AlertEmail, Skip> {
    let message = MessageParser::default().parse(raw).ok_or(Skip::NotMime)?;

    let subject = message.subject().unwrap_or_default();
    if !subject_matches(subject, &filter.subjects) {
        return Err(Skip::Subject(subject.to_string()));
    }

    if filter.since.is_some() || filter.until.is_some() {
        let day = message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
            .map(|d| d.date_naive())
            .ok_or(Skip::Undated)?;
        let too_early = filter.since.is_some_and(|since| day < since);
        let too_late = filter.until.is_some_and(|until| day > until);
        if too_early || too_late {
            return Err(Skip::OutsideWindow(day));
        }
    }

    // `html_body` falls back to text parts when no HTML alternative exists.
    let html = message
        .html_part(0)
        .and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.as_ref()),
            _ => None,
        })
        .ok_or(Skip::NoHtmlBody)?;

    Ok(AlertEmail::from_html(id, html))
}

/// Read every exported email in `dir`, ordered by file name.
///
/// `*.eml` files are parsed as MIME messages and filtered through `filter`;
/// `*.html` / `*.htm` files are taken as already-decoded bodies. Anything
/// else in the directory is ignored.
///
/// # Arguments
///
/// * `dir` - the inbox directory
/// * `filter` - which `.eml` messages count as alerts
///
/// # Returns
///
/// One [`AlertEmail`] per accepted file. Skipped messages are logged.
///
/// # Errors
///
/// Any I/O error listing the directory or reading a file.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn read_inbox(
    dir: &Path,
    filter: &MailboxConfig,
) -> Result<Vec<AlertEmail>, std::io::Error> {
    let mut paths: Vec<(PathBuf, Format)> = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(format) = format_of(&path) {
            paths.push((path, format));
        }
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut emails = Vec::with_capacity(paths.len());
    let mut skipped = 0usize;
    for (path, format) in paths {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(&path).await?;
        let email = match format {
            Format::Html => AlertEmail::from_html(id, &String::from_utf8_lossy(&bytes)),
            Format::Eml => match parse_eml(&id, &bytes, filter) {
                Ok(email) => email,
                Err(reason) => {
                    debug!(email = %id, %reason, "Skipping message");
                    skipped += 1;
                    continue;
                }
            },
        };
        if email.hrefs.is_empty() {
            warn!(email = %email.id, "No links found in email");
        } else {
            debug!(email = %email.id, links = email.hrefs.len(), "Read alert email");
        }
        emails.push(email);
    }

    info!(count = emails.len(), skipped, "Read alert emails");
    Ok(emails)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERT: &str = r##"
        <html><body>
          <a href="https://www.google.com/url?url=https://news.example/a">Story A</a>
          <a href=" https://news.example/b ">Story B</a>
          <a href="https://www.google.com/url?url=https://news.example/a">Story A again</a>
          <a href="#top">Top</a>
          <a href="">Empty</a>
          <a name="anchor-without-href">Nothing</a>
        </body></html>
    "##;

    #[test]
    fn test_anchors_in_dedupes_and_keeps_order() {
        let hrefs = anchors_in(ALERT);
        assert_eq!(
            hrefs,
            vec![
                "https://www.google.com/url?url=https://news.example/a",
                "https://news.example/b",
            ]
        );
    }

    #[test]
    fn test_anchors_in_plain_text() {
        assert!(anchors_in("no markup here").is_empty());
    }

    fn any_alert() -> MailboxConfig {
        MailboxConfig::default()
    }

    fn within(since: &str, until: &str) -> MailboxConfig {
        MailboxConfig {
            since: Some(since.parse().unwrap()),
            until: Some(until.parse().unwrap()),
            ..MailboxConfig::default()
        }
    }

    // Quoted-printable HTML alternative with a soft line break inside an href.
    const QP_ALERT: &str = "From: Google Alerts <googlealerts-noreply@google.com>\r\n\
To: desk@example.com\r\n\
Subject: Google Alert - semiconductors\r\n\
Date: Wed, 14 Oct 2026 08:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain; charset=\"UTF-8\"\r\n\
\r\n\
Plain text version without anchors.\r\n\
--alt\r\n\
Content-Type: text/html; charset=\"UTF-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<html><body><a href=3D\"https://www.google.com/url?url=3Dhttps://news.example=\r\n\
/chips&amp;ct=3Dga\">Chips</a>\r\n\
<a href=3D\"https://news.example/fabs\">Fabs</a></body></html>\r\n\
--alt--\r\n";

    fn eml(subject: &str, date: &str, body_headers: &str, body: &str) -> String {
        format!(
            "From: alerts@example.com\r\nSubject: {subject}\r\nDate: {date}\r\n\
             MIME-Version: 1.0\r\n{body_headers}\r\n\r\n{body}\r\n"
        )
    }

    #[test]
    fn test_parse_eml_decodes_quoted_printable_html() {
        let email = parse_eml("alert.eml", QP_ALERT.as_bytes(), &any_alert()).unwrap();
        assert_eq!(email.id, "alert.eml");
        assert_eq!(
            email.hrefs,
            vec![
                "https://www.google.com/url?url=https://news.example/chips&ct=ga",
                "https://news.example/fabs",
            ]
        );
    }

    #[test]
    fn test_parse_eml_matches_encoded_chinese_subject() {
        let raw = eml(
            "=?UTF-8?B?R29vZ2xlIOW/q+ioiiAtIOWNiuWwjumrlA==?=",
            "Thu, 15 Oct 2026 01:30:00 +0800",
            "Content-Type: text/html; charset=\"UTF-8\"",
            r#"<a href="https://news.example/tw">TW</a>"#,
        );
        let email = parse_eml("tw.eml", raw.as_bytes(), &any_alert()).unwrap();
        assert_eq!(email.hrefs, vec!["https://news.example/tw"]);
    }

    #[test]
    fn test_parse_eml_rejects_other_subjects() {
        let raw = eml(
            "Your weekly newsletter",
            "Wed, 14 Oct 2026 08:00:00 +0000",
            "Content-Type: text/html",
            r#"<a href="https://shop.example/">Buy</a>"#,
        );
        let err = parse_eml("ad.eml", raw.as_bytes(), &any_alert()).unwrap_err();
        assert_eq!(err, Skip::Subject("Your weekly newsletter".to_string()));

        let everything = MailboxConfig {
            subjects: Vec::new(),
            ..MailboxConfig::default()
        };
        assert!(parse_eml("ad.eml", raw.as_bytes(), &everything).is_ok());
    }

    #[test]
    fn test_parse_eml_date_window_is_inclusive_utc() {
        let raw = QP_ALERT.as_bytes();
        assert!(parse_eml("a.eml", raw, &within("2026-10-14", "2026-10-14")).is_ok());
        assert_eq!(
            parse_eml("a.eml", raw, &within("2026-10-15", "2026-10-31")).unwrap_err(),
            Skip::OutsideWindow(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap())
        );
        assert!(matches!(
            parse_eml("a.eml", raw, &within("2026-10-01", "2026-10-13")),
            Err(Skip::OutsideWindow(_))
        ));

        // 01:30 +08:00 on the 15th is still the 14th in UTC.
        let late = eml(
            "Google Alert - late",
            "Thu, 15 Oct 2026 01:30:00 +0800",
            "Content-Type: text/html",
            r#"<a href="https://news.example/late">late</a>"#,
        );
        assert!(parse_eml("l.eml", late.as_bytes(), &within("2026-10-14", "2026-10-14")).is_ok());
    }

    #[test]
    fn test_parse_eml_without_date_fails_only_when_windowed() {
        let raw = "Subject: Google Alert - undated\r\nContent-Type: text/html\r\n\r\n\
                   <a href=\"https://news.example/u\">u</a>\r\n";
        assert!(parse_eml("u.eml", raw.as_bytes(), &any_alert()).is_ok());
        assert_eq!(
            parse_eml("u.eml", raw.as_bytes(), &within("2026-10-01", "2026-10-31")).unwrap_err(),
            Skip::Undated
        );
    }

    #[test]
    fn test_parse_eml_requires_html_part() {
        let raw = eml(
            "Google Alert - text only",
            "Wed, 14 Oct 2026 08:00:00 +0000",
            "Content-Type: text/plain",
            "https://news.example/plain",
        );
        assert_eq!(
            parse_eml("t.eml", raw.as_bytes(), &any_alert()).unwrap_err(),
            Skip::NoHtmlBody
        );
    }

    #[tokio::test]
    async fn test_read_inbox_mixes_eml_and_html() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("01-alert.eml"), QP_ALERT).unwrap();
        std::fs::write(
            tmp.path().join("02-promo.eml"),
            eml(
                "Sale ends today",
                "Wed, 14 Oct 2026 08:00:00 +0000",
                "Content-Type: text/html",
                r#"<a href="https://shop.example/">Buy</a>"#,
            ),
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("03-body.html"),
            r#"<a href="https://news.example/3">three</a>"#,
        )
        .unwrap();

        let emails = read_inbox(tmp.path(), &any_alert()).await.unwrap();
        let ids: Vec<&str> = emails.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["01-alert.eml", "03-body.html"]);
        assert_eq!(emails[0].hrefs.len(), 2);
    }

    #[tokio::test]
    async fn test_read_inbox_orders_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("02-second.html"),
            r#"<a href="https://news.example/2">two</a>"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("01-first.HTM"),
            r#"<a href="https://news.example/1">one</a>"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let emails = read_inbox(tmp.path(), &any_alert()).await.unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].id, "01-first.HTM");
        assert_eq!(emails[0].hrefs, vec!["https://news.example/1"]);
        assert_eq!(emails[1].id, "02-second.html");
    }

    #[tokio::test]
    async fn test_read_inbox_missing_dir() {
        assert!(read_inbox(Path::new("/no/such/inbox"), &any_alert()).await.is_err());
    }
}
