use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use tidings_core::{ArticleStore, Source};

use crate::dto::{HealthResponse, LimitQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the full router. `/api/news` is the CNBC feed under its legacy name.
pub fn router<S: ArticleStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(health::<S>))
        .route("/api/news", get(cnbc_news::<S>))
        .route("/api/{feed}", get(latest_news::<S>))
        .route("/api/news-from-db/{feed}", get(stored_news::<S>))
        .with_state(state)
}

/// Map a `{route_slug}-news` path segment to its source.
fn feed_source(feed: &str) -> Result<Source, ApiError> {
    feed.strip_suffix("-news")
        .and_then(|slug| Source::ALL.into_iter().find(|s| s.route_slug() == slug))
        .ok_or_else(|| ApiError::UnknownFeed(feed.to_string()))
}

// ---------------------------------------------------------------------------
// RAM tier
// ---------------------------------------------------------------------------

pub async fn latest_news<S: ArticleStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(feed): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let source = feed_source(&feed)?;
    let limit = state.config.read_limit(query.limit);
    Ok(axum::Json(state.cache.latest(source, limit).await))
}

pub async fn cnbc_news<S: ArticleStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = state.config.read_limit(query.limit);
    axum::Json(state.cache.latest(Source::Cnbc, limit).await)
}

// ---------------------------------------------------------------------------
// Persistent tier
// ---------------------------------------------------------------------------

pub async fn stored_news<S: ArticleStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(feed): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let source = feed_source(&feed)?;
    let limit = state.config.read_limit(query.limit);
    let history = state.cache.history(source, limit).await?;
    Ok(axum::Json(history))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health<S: ArticleStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let store_status = match state.cache.persistent().health_check().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Persistent tier health probe failed");
            "error"
        }
    };

    let mut sources = BTreeMap::new();
    for source in Source::ALL {
        sources.insert(source.route_slug(), state.cache.get(source).await.len());
    }

    let status = if store_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if store_status == "ok" {
            "healthy"
        } else {
            "degraded"
        },
        store: store_status,
        scheduler: state.scheduler.borrow().as_str(),
        sources,
    };

    (status, axum::Json(response))
}
