//! Dual-tier cache: an in-memory snapshot per source plus the persistent,
//! link-keyed collection behind an [`ArticleStore`].

use std::sync::Arc;

use moka::future::Cache;

use crate::error::AppError;
use crate::models::{Article, LatestArticles, Source, UpsertOutcome};
use crate::traits::ArticleStore;

/// RAM tier: one slot per source holding the latest complete article list.
///
/// Each slot holds an `Arc`, so replacing it is a single pointer swap and a
/// reader sees either the old list or the new one, never a mix. Clones share
/// the same slots.
#[derive(Clone)]
pub struct SnapshotCache {
    slots: Cache<Source, Arc<Vec<Article>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            slots: Cache::builder().name("ram-tier").build(),
        }
    }

    /// Swap in a new snapshot for `source`, ordered newest first.
    pub async fn replace(&self, source: Source, mut articles: Vec<Article>) {
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        self.slots.insert(source, Arc::new(articles)).await;
    }

    /// Current snapshot; empty until the first successful harvest.
    pub async fn get(&self, source: Source) -> Arc<Vec<Article>> {
        self.slots.get(&source).await.unwrap_or_default()
    }

    /// Up to `limit` newest articles of the current snapshot.
    pub async fn latest(&self, source: Source, limit: usize) -> LatestArticles {
        let snapshot = self.get(source).await;
        let articles: Vec<Article> = snapshot.iter().take(limit).cloned().collect();
        LatestArticles::from(articles)
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts from writing one batch into the persistent tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Owns both tiers. The scheduler writes through it; readers use
/// [`CacheStore::snapshots`] or the query helpers.
#[derive(Clone)]
pub struct CacheStore<S: ArticleStore> {
    snapshots: SnapshotCache,
    persistent: S,
}

impl<S: ArticleStore> CacheStore<S> {
    pub fn new(persistent: S) -> Self {
        Self {
            snapshots: SnapshotCache::new(),
            persistent,
        }
    }

    /// Read handle on the RAM tier.
    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    pub fn persistent(&self) -> &S {
        &self.persistent
    }

    pub async fn replace(&self, source: Source, articles: Vec<Article>) {
        self.snapshots.replace(source, articles).await;
    }

    pub async fn get(&self, source: Source) -> Arc<Vec<Article>> {
        self.snapshots.get(source).await
    }

    pub async fn latest(&self, source: Source, limit: usize) -> LatestArticles {
        self.snapshots.latest(source, limit).await
    }

    /// Newest persisted articles of a source, independent of the RAM tier.
    pub async fn history(&self, source: Source, limit: usize) -> Result<LatestArticles, AppError> {
        let articles = self.persistent.latest(source, limit).await?;
        Ok(LatestArticles::from(articles))
    }

    /// Upsert every article, continuing past individual failures.
    ///
    /// Returns the tally together with the first error seen, if any.
    pub async fn persist(&self, articles: &[Article]) -> (PersistReport, Option<AppError>) {
        let mut report = PersistReport::default();
        let mut first_error = None;

        for article in articles {
            match self.persistent.upsert(article).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    tracing::debug!(link = %article.link, error = %e, "Upsert failed");
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        (report, first_error)
    }
}
