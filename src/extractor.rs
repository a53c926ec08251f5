//! Article page fetching and main-text extraction.
//!
//! The heuristic is deliberately small: prefer paragraphs inside `<article>`,
//! fall back to every `<p>` on the page, and drop short fragments that are
//! almost always navigation, captions or share buttons.

use crate::error::ExtractError;
use crate::models::{ArticleRecord, UNKNOWN_TITLE};
use crate::utils::collapse_whitespace;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Paragraphs shorter than this (in characters) are treated as boilerplate.
const MIN_PARAGRAPH_CHARS: usize = 40;

/// Fetches a resolved URL and returns its title and body.
///
/// Ordinary fetch and parse problems are reported in-band as an
/// `EXTRACT_FAILED` record. `Err` is reserved for failures the extractor
/// cannot describe as a record.
pub trait Extract {
    async fn extract(&self, url: &str) -> Result<ArticleRecord, ExtractError>;
}

/// Title and body pulled out of an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl Extract for HttpExtractor {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn extract(&self, url: &str) -> Result<ArticleRecord, ExtractError> {
        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Article fetch failed");
                return Ok(ArticleRecord::failed(url, None));
            }
        };

        let page = parse_article(&html)?;
        if page.body.is_empty() {
            warn!(title = ?page.title, "No article text found");
            return Ok(ArticleRecord::failed(url, page.title));
        }

        info!(bytes = page.body.len(), "Parsed article");
        let title = page
            .title
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        Ok(ArticleRecord::extracted(url, title, page.body))
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

/// Pull the title and main text out of an HTML page.
pub fn parse_article(html: &str) -> Result<ParsedPage, ExtractError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?;

    let article_paragraphs = selector("article p")?;
    let all_paragraphs = selector("p")?;

    let mut paragraphs = collect_paragraphs(&document, &article_paragraphs);
    if paragraphs.is_empty() {
        debug!("No <article> paragraphs; falling back to every <p>");
        paragraphs = collect_paragraphs(&document, &all_paragraphs);
    }

    Ok(ParsedPage {
        title,
        body: paragraphs.join("\n"),
    })
}

fn extract_title(document: &Html) -> Result<Option<String>, ExtractError> {
    let og_title = selector(r#"meta[property="og:title"]"#)?;
    if let Some(content) = document
        .select(&og_title)
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .find(|t| !t.is_empty())
    {
        return Ok(Some(content));
    }

    for css in ["title", "h1"] {
        let sel = selector(css)?;
        if let Some(text) = document
            .select(&sel)
            .map(|e| collapse_whitespace(&e.text().collect::<String>()))
            .find(|t| !t.is_empty())
        {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

fn collect_paragraphs(document: &Html, sel: &Selector) -> Vec<String> {
    document
        .select(sel)
        .map(|p| collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect()
}
