use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tidings_core::models::parse_timestamp;
use tidings_core::traits::{Fetcher, TimeResolver};

/// Markup that carries an article's publication time, in preference order.
static TIME_SOURCES: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        ("time[datetime]", "datetime"),
        ("meta[property=\"article:published_time\"]", "content"),
        ("meta[itemprop=\"datePublished\"]", "content"),
    ]
    .into_iter()
    .filter_map(|(css, attr)| Selector::parse(css).ok().map(|sel| (sel, attr)))
    .collect()
});

/// Resolves publish times by fetching the article page and reading its
/// time markup.
///
/// Every call costs one outbound request, bounded by the fetcher's timeout.
#[derive(Clone)]
pub struct HttpTimeResolver<F: Fetcher> {
    fetcher: F,
}

impl<F: Fetcher> HttpTimeResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: Fetcher> TimeResolver for HttpTimeResolver<F> {
    async fn resolve(&self, article_url: &str) -> Option<DateTime<Utc>> {
        let html = match self.fetcher.fetch(article_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(url = %article_url, error = %e, "Article fetch failed");
                return None;
            }
        };

        let published = extract_published_at(&html);
        if published.is_none() {
            tracing::debug!(url = %article_url, "No usable time markup");
        }
        published
    }
}

/// Find the first parseable publish time in an article document.
pub fn extract_published_at(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);
    TIME_SOURCES.iter().find_map(|(selector, attr)| {
        document
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .and_then(parse_timestamp)
    })
}
