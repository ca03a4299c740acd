use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Configured news outlets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cnn,
    Cnbc,
    FoxBusiness,
    Yahoo,
    Cbs,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Cnn,
        Source::Cnbc,
        Source::FoxBusiness,
        Source::Yahoo,
        Source::Cbs,
    ];

    /// Storage key for the source's collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cnn => "cnn",
            Source::Cnbc => "cnbc",
            Source::FoxBusiness => "fox",
            Source::Yahoo => "yahoo",
            Source::Cbs => "cbsnews",
        }
    }

    /// Path fragment used by the read API (`/api/{route_slug}-news`).
    pub fn route_slug(&self) -> &'static str {
        match self {
            Source::Cnn => "cnn",
            Source::Cnbc => "cnbc",
            Source::FoxBusiness => "foxbusiness",
            Source::Yahoo => "yahoo",
            Source::Cbs => "cbs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Cnn => "CNN",
            Source::Cnbc => "CNBC",
            Source::FoxBusiness => "Fox Business",
            Source::Yahoo => "Yahoo Finance",
            Source::Cbs => "CBS News",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == needle || source.route_slug() == needle)
            .ok_or_else(|| format!("Unknown source: {s}"))
    }
}

/// One headline as extracted by an adapter, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    /// Publication time as found in the page, if any.
    pub published_at: Option<String>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at.to_rfc3339());
        self
    }
}

/// Canonical headline record.
///
/// Serialises as `{title, link, publishedAt}`; the source is implied by the
/// collection the article is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip)]
    pub source: Source,
}

/// Read envelope returned to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct LatestArticles {
    pub count: usize,
    pub articles: Vec<Article>,
}

impl From<Vec<Article>> for LatestArticles {
    fn from(articles: Vec<Article>) -> Self {
        Self {
            count: articles.len(),
            articles,
        }
    }
}

/// Result of a persistent-tier upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Parse a page-supplied timestamp into UTC.
///
/// Accepts RFC 3339, ISO-8601 with `+hhmm` offsets, naive date-times
/// (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%z",
    ];
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
