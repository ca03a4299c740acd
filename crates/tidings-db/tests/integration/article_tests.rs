use chrono::{DateTime, TimeZone, Utc};
use tidings_core::models::{Article, Source, UpsertOutcome};
use tidings_core::{ArticleStore, CacheStore};
use tidings_db::ArticleRepository;

use crate::common::setup_test_db;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 6, hour, 0, 0).unwrap()
}

fn article(source: Source, link: &str, title: &str, published_at: DateTime<Utc>) -> Article {
    Article {
        title: title.into(),
        link: link.into(),
        published_at,
        source,
    }
}

#[tokio::test]
async fn upsert_inserts_then_updates_same_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = ArticleRepository::new(pool);
    let link = "https://www.cnbc.com/2025/05/06/fed.html";

    let first = repo
        .upsert(&article(Source::Cnbc, link, "Fed holds", at(9)))
        .await
        .unwrap();
    assert_eq!(first.outcome, UpsertOutcome::Inserted);

    let second = repo
        .upsert(&article(Source::Cnbc, link, "Fed holds rates steady", at(10)))
        .await
        .unwrap();
    assert_eq!(second.outcome, UpsertOutcome::Updated);
    assert_eq!(second.id, first.id);

    assert_eq!(repo.count(Source::Cnbc).await.unwrap(), 1);
    let latest = repo.latest(Source::Cnbc, 10).await.unwrap();
    assert_eq!(
        latest,
        vec![article(Source::Cnbc, link, "Fed holds rates steady", at(10))]
    );
}

#[tokio::test]
async fn repeated_upsert_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let repo = ArticleRepository::new(pool);
    let a = article(Source::Yahoo, "https://finance.yahoo.com/news/a.html", "A", at(8));

    for _ in 0..3 {
        ArticleStore::upsert(&repo, &a).await.unwrap();
    }

    assert_eq!(repo.count(Source::Yahoo).await.unwrap(), 1);
    assert_eq!(repo.latest(Source::Yahoo, 5).await.unwrap(), vec![a]);
}

#[tokio::test]
async fn same_link_is_distinct_per_source() {
    let (pool, _container) = setup_test_db().await;
    let repo = ArticleRepository::new(pool);
    let link = "https://example.com/shared";

    repo.upsert(&article(Source::Cnn, link, "From CNN", at(7)))
        .await
        .unwrap();
    let other = repo
        .upsert(&article(Source::Cbs, link, "From CBS", at(7)))
        .await
        .unwrap();

    assert_eq!(other.outcome, UpsertOutcome::Inserted);
    assert_eq!(repo.count(Source::Cnn).await.unwrap(), 1);
    assert_eq!(repo.count(Source::Cbs).await.unwrap(), 1);
    assert_eq!(repo.count(Source::Cnbc).await.unwrap(), 0);
}

#[tokio::test]
async fn latest_is_newest_first_and_limited() {
    let (pool, _container) = setup_test_db().await;
    let repo = ArticleRepository::new(pool);

    for (link, hour) in [("https://f/1", 1), ("https://f/3", 3), ("https://f/2", 2)] {
        repo.upsert(&article(Source::FoxBusiness, link, "x", at(hour)))
            .await
            .unwrap();
    }

    let latest = repo.latest(Source::FoxBusiness, 2).await.unwrap();
    let links: Vec<_> = latest.iter().map(|a| a.link.as_str()).collect();
    assert_eq!(links, vec!["https://f/3", "https://f/2"]);
    assert!(latest.iter().all(|a| a.source == Source::FoxBusiness));

    assert!(repo.latest(Source::Cnn, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn cache_store_persists_batch_into_postgres() {
    let (pool, _container) = setup_test_db().await;
    let cache = CacheStore::new(ArticleRepository::new(pool));
    let batch = vec![
        article(Source::Cnbc, "https://c/1", "One", at(1)),
        article(Source::Cnbc, "https://c/2", "Two", at(2)),
    ];

    let (first, error) = cache.persist(&batch).await;
    assert!(error.is_none());
    assert_eq!((first.inserted, first.updated), (2, 0));

    let (second, _) = cache.persist(&batch).await;
    assert_eq!((second.inserted, second.updated), (0, 2));

    let history = cache.history(Source::Cnbc, 50).await.unwrap();
    assert_eq!(history.count, 2);
    assert_eq!(history.articles[0].link, "https://c/2");
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    ArticleRepository::new(pool).health_check().await.unwrap();
}
