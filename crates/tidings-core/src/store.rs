use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::AppError;
use crate::models::{Article, Source, UpsertOutcome};
use crate::traits::ArticleStore;

/// In-process persistent tier.
///
/// Used by tests and by deployments that run without a database. Documents
/// live for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryArticleStore {
    collections: Arc<RwLock<HashMap<Source, HashMap<String, Article>>>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up one document by its match key.
    pub fn find(&self, source: Source, link: &str) -> Option<Article> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        collections
            .get(&source)
            .and_then(|docs| docs.get(link))
            .cloned()
    }
}

impl ArticleStore for MemoryArticleStore {
    async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, AppError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let previous = collections
            .entry(article.source)
            .or_default()
            .insert(article.link.clone(), article.clone());

        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    async fn latest(&self, source: Source, limit: usize) -> Result<Vec<Article>, AppError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let mut articles: Vec<Article> = collections
            .get(&source)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();

        articles.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.link.cmp(&b.link))
        });
        articles.truncate(limit);
        Ok(articles)
    }

    async fn count(&self, source: Source) -> Result<u64, AppError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections.get(&source).map_or(0, |docs| docs.len() as u64))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
