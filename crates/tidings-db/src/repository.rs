use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use tidings_core::error::AppError;
use tidings_core::models::{Article, Source, UpsertOutcome};
use uuid::Uuid;

/// Result of writing one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredArticle {
    /// Row id; stable across updates of the same link.
    pub id: Uuid,
    pub outcome: UpsertOutcome,
}

/// Persistent tier in PostgreSQL: the `articles` table, unique per
/// `(source, link)`.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: Pool<Postgres>,
}

impl ArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the article, or overwrite title and publish time of the row
    /// that already carries its link.
    pub async fn upsert(&self, article: &Article) -> Result<StoredArticle, AppError> {
        // `xmax` is zero only for a freshly inserted tuple.
        let (id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO articles (source, link, title, published_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source, link) DO UPDATE
            SET title = EXCLUDED.title,
                published_at = EXCLUDED.published_at,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(article.source.as_str())
        .bind(&article.link)
        .bind(&article.title)
        .bind(article.published_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let outcome = if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        };
        Ok(StoredArticle { id, outcome })
    }

    /// Newest articles of a source by publish time.
    pub async fn latest(&self, source: Source, limit: usize) -> Result<Vec<Article>, AppError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT source, link, title, published_at
            FROM articles
            WHERE source = $1
            ORDER BY published_at DESC, link
            LIMIT $2
            "#,
        )
        .bind(source.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Article::try_from).collect()
    }

    pub async fn count(&self, source: Source) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE source = $1")
            .bind(source.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(count as u64)
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ArticleRow {
    source: String,
    link: String,
    title: String,
    published_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = AppError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let source = row.source.parse::<Source>().map_err(AppError::DatabaseError)?;
        Ok(Article {
            title: row.title,
            link: row.link,
            published_at: row.published_at,
            source,
        })
    }
}

// -- Trait implementation --

impl tidings_core::traits::ArticleStore for ArticleRepository {
    async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, AppError> {
        Ok(ArticleRepository::upsert(self, article).await?.outcome)
    }

    async fn latest(&self, source: Source, limit: usize) -> Result<Vec<Article>, AppError> {
        ArticleRepository::latest(self, source, limit).await
    }

    async fn count(&self, source: Source) -> Result<u64, AppError> {
        ArticleRepository::count(self, source).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        ArticleRepository::health_check(self).await
    }
}
