//! First-occurrence-wins de-duplication passes.
//!
//! Both passes keep the original order and hold no state between calls.

use crate::models::{ArticleRecord, CandidateLink};
use itertools::Itertools;

/// Drop unresolved links and every link whose resolved URL was already seen.
///
/// The returned links all carry `Some(resolved_url)`.
pub fn unique_links(links: Vec<CandidateLink>) -> Vec<CandidateLink> {
    links
        .into_iter()
        .filter(|l| l.resolved_url.is_some())
        .unique_by(|l| l.resolved_url.clone())
        .collect()
}

/// Drop every article whose body exactly matches an earlier one.
pub fn unique_bodies(articles: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    articles
        .into_iter()
        .unique_by(|a| a.body.clone())
        .collect()
}
