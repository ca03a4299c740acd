use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;

use tidings_core::{Article, ArticleStore, CacheStore, HarvestConfig, SchedulerState, Source};
use tidings_server::routes;
use tidings_server::state::AppState;

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 6, 12, minute, 0).unwrap()
}

pub fn article(source: Source, link: &str, published_at: DateTime<Utc>) -> Article {
    Article {
        title: format!("Headline {link}"),
        link: link.to_string(),
        published_at,
        source,
    }
}

/// Router over `cache`, with the harvester reported as idle.
pub fn app<S: ArticleStore + 'static>(cache: CacheStore<S>) -> Router {
    let (_state_tx, scheduler) = watch::channel(SchedulerState::Idle);
    routes::router(Arc::new(AppState {
        cache,
        config: HarvestConfig::default(),
        scheduler,
    }))
}

/// Issue a GET and decode the JSON body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}
