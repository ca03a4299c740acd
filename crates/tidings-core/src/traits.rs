use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{Article, RawItem, Source, UpsertOutcome};

/// Fetches a page body over HTTP.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Opens JavaScript-rendered pages in a headless browser.
pub trait PageRenderer: Send + Sync + Clone {
    type Page: RenderedPage;

    /// Open a new session and navigate it to `url`.
    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Page, AppError>> + Send;
}

/// Snapshot of one element queried from a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A live rendered-page session. Callers must `close` it on every path.
pub trait RenderedPage: Send + Sync {
    /// Wait until at least one element matches `selector`, up to `timeout`.
    fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Query the first `limit` elements matching `selector`, capturing their
    /// text and the requested attributes.
    fn query_all(
        &self,
        selector: &str,
        attributes: &[&str],
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ElementSnapshot>, AppError>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Recovers an article's publication instant from its page.
pub trait TimeResolver: Send + Sync + Clone {
    /// `None` means the time could not be determined.
    fn resolve(&self, article_url: &str) -> impl Future<Output = Option<DateTime<Utc>>> + Send;
}

/// Source-specific extraction unit.
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    fn harvest(&self) -> impl Future<Output = Result<Vec<RawItem>, AppError>> + Send;
}

/// Persistent tier: one logical collection per source, keyed by link.
pub trait ArticleStore: Send + Sync + Clone {
    /// Insert the article, or overwrite every field of the document that
    /// already carries its link.
    fn upsert(
        &self,
        article: &Article,
    ) -> impl Future<Output = Result<UpsertOutcome, AppError>> + Send;

    /// Newest articles of a source by publish time.
    fn latest(
        &self,
        source: Source,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Article>, AppError>> + Send;

    fn count(&self, source: Source) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Check that the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
