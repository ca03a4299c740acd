use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tidings_core::testutil::FailingStore;
use tidings_core::{ArticleStore, CacheStore, MemoryArticleStore, Source};

use crate::common::{app, article, at, get_json};

#[tokio::test]
async fn health_reports_snapshot_sizes() {
    let cache = CacheStore::new(MemoryArticleStore::new());
    cache
        .replace(Source::Cnn, vec![article(Source::Cnn, "https://cnn/1", at(1))])
        .await;

    let (status, json) = get_json(app(cache), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "ok");
    assert_eq!(json["scheduler"], "idle");
    assert_eq!(json["sources"]["cnn"], 1);
    assert_eq!(json["sources"]["foxbusiness"], 0);
}

#[tokio::test]
async fn health_is_degraded_when_store_fails() {
    let (status, json) = get_json(app(CacheStore::new(FailingStore::new("down"))), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["store"], "error");
}

#[tokio::test]
async fn latest_news_serves_ram_snapshot_newest_first() {
    let cache = CacheStore::new(MemoryArticleStore::new());
    cache
        .replace(
            Source::Yahoo,
            vec![
                article(Source::Yahoo, "https://y/old", at(1)),
                article(Source::Yahoo, "https://y/new", at(5)),
            ],
        )
        .await;

    let (status, json) = get_json(app(cache), "/api/yahoo-news").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["articles"][0]["link"], "https://y/new");
    assert_eq!(json["articles"][0]["title"], "Headline https://y/new");
    assert_eq!(json["articles"][0]["publishedAt"], "2025-05-06T12:05:00Z");
    assert!(json["articles"][0].get("source").is_none());
}

#[tokio::test]
async fn unharvested_source_is_empty() {
    let (status, json) = get_json(app(CacheStore::new(MemoryArticleStore::new())), "/api/cbs-news").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 0);
    assert_eq!(json["articles"], serde_json::json!([]));
}

#[tokio::test]
async fn limit_is_applied_and_clamped() {
    let cache = CacheStore::new(MemoryArticleStore::new());
    let articles = (0..5)
        .map(|i| article(Source::Cnbc, &format!("https://c/{i}"), at(i)))
        .collect();
    cache.replace(Source::Cnbc, articles).await;
    let router = app(cache);

    let (_, json) = get_json(router.clone(), "/api/cnbc-news?limit=2").await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["articles"][0]["link"], "https://c/4");

    let (_, json) = get_json(router.clone(), "/api/cnbc-news?limit=0").await;
    assert_eq!(json["count"], 1);

    let (_, json) = get_json(router, "/api/news").await;
    assert_eq!(json["count"], 5);
}

#[tokio::test]
async fn invalid_limit_is_rejected() {
    let response = app(CacheStore::new(MemoryArticleStore::new()))
        .oneshot(
            Request::get("/api/cnn-news?limit=lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_feed_returns_404() {
    let (status, json) = get_json(app(CacheStore::new(MemoryArticleStore::new())), "/api/bbc-news").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn stored_news_reads_persistent_tier() {
    let store = MemoryArticleStore::new();
    for (link, minute) in [("https://f/1", 1), ("https://f/2", 2)] {
        store
            .upsert(&article(Source::FoxBusiness, link, at(minute)))
            .await
            .unwrap();
    }
    // RAM tier deliberately left empty.
    let cache = CacheStore::new(store);

    let (status, json) = get_json(app(cache), "/api/news-from-db/foxbusiness-news").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["articles"][0]["link"], "https://f/2");
}

#[tokio::test]
async fn stored_news_surfaces_store_failure() {
    let cache = CacheStore::new(FailingStore::new("connection refused"));

    let (status, json) = get_json(app(cache), "/api/news-from-db/cnn-news").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "database_error");
}
