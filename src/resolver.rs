//! Turn alert hyperlinks into canonical article URLs.
//!
//! Alert providers wrap every article link in a tracking redirect. Wrappers
//! that carry the destination in the query string are unwrapped locally; the
//! remaining hop (publisher short links, `amp` redirects and the like) is
//! followed over HTTP. A failure of any kind drops the link for this run.

use crate::error::ResolveError;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Maps a raw `href` to the URL it finally lands on.
pub trait Resolve {
    /// Follow `href` to its destination.
    ///
    /// # Arguments
    ///
    /// * `href` - a link exactly as it appeared in the alert email
    ///
    /// # Returns
    ///
    /// The final URL after unwrapping alert redirectors and following HTTP
    /// redirects. Two hrefs that land on the same page return equal strings.
    ///
    /// # Errors
    ///
    /// A [`ResolveError`] when the link is not an http(s) URL, the request
    /// fails or times out, or the destination answers 404/410. The caller
    /// drops the link.
    async fn resolve(&self, href: &str) -> Result<String, ResolveError>;
}

/// Query parameters alert wrappers use to carry the destination.
const WRAPPER_PARAMS: [&str; 2] = ["url", "q"];

/// Resolver that follows redirects with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    /// Build a resolver whose every request (redirect chain included) is
    /// bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

impl Resolve for HttpResolver {
    #[instrument(level = "debug", skip_all, fields(%href))]
    async fn resolve(&self, href: &str) -> Result<String, ResolveError> {
        let parsed = parse_web_url(href)?;
        let target = unwrap_redirector(&parsed).unwrap_or(parsed);

        let response = self.client.get(target).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ResolveError::Status(status));
        }

        let resolved = response.url().to_string();
        debug!(%resolved, %status, "Resolved link");
        Ok(resolved)
    }
}

/// Parse `href` and reject anything that is not http(s).
pub fn parse_web_url(href: &str) -> Result<Url, ResolveError> {
    let url = Url::parse(href.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ResolveError::UnsupportedScheme(other.to_string())),
    }
}

/// If `url` is a `google.*/url?...` wrapper, return the embedded destination.
pub fn unwrap_redirector(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    let is_google = host == "google.com"
        || host.starts_with("google.")
        || host.starts_with("www.google.");
    if !is_google || url.path() != "/url" {
        return None;
    }

    url.query_pairs()
        .filter(|(k, _)| WRAPPER_PARAMS.contains(&k.as_ref()))
        .find_map(|(_, v)| parse_web_url(&v).ok())
}
