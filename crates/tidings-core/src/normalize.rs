use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Article, RawItem, Source, parse_timestamp};

/// Shape one raw item into an [`Article`].
///
/// Returns `None` when the title or link is empty after trimming. A missing
/// or unparseable timestamp becomes `fallback`.
pub fn normalize(raw: RawItem, source: Source, fallback: DateTime<Utc>) -> Option<Article> {
    let title = collapse_whitespace(&raw.title);
    let link = raw.link.trim();
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let published_at = raw
        .published_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(fallback);

    Some(Article {
        title,
        link: link.to_string(),
        published_at,
        source,
    })
}

/// Normalize a whole harvest, keeping the first occurrence of each link.
pub fn normalize_batch(
    items: Vec<RawItem>,
    source: Source,
    fallback: DateTime<Utc>,
) -> Vec<Article> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|raw| normalize(raw, source, fallback))
        .filter(|article| seen.insert(article.link.clone()))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
