use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tidings_core::{
    ArticleStore, CacheStore, HarvestConfig, HarvestScheduler, MemoryArticleStore, Source,
    TracingHarvestReporter,
};
use tidings_db::{Database, DatabaseConfig};
use tidings_server::routes;
use tidings_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tidings=info".parse()?))
        .with_target(false)
        .init();

    let config = HarvestConfig::from_env()?;
    let port = std::env::var("TIDINGS_SERVER_PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("0.0.0.0:{port}");

    match DatabaseConfig::from_env_optional()? {
        Some(db_config) => {
            let db = Database::connect(&db_config).await?;
            db.migrate().await?;
            serve(db.article_repo(), config, &addr).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; persisting to memory only");
            serve(MemoryArticleStore::new(), config, &addr).await
        }
    }
}

async fn serve<S: ArticleStore + 'static>(
    store: S,
    config: HarvestConfig,
    addr: &str,
) -> anyhow::Result<()> {
    let adapters = tidings_client::live_adapters(&Source::ALL, &config)?;
    let cache = CacheStore::new(store);
    let scheduler = Arc::new(HarvestScheduler::new(
        adapters,
        cache.clone(),
        config.poll_interval,
    ));

    let state = Arc::new(AppState {
        cache,
        config,
        scheduler: scheduler.subscribe(),
    });

    let cancel = CancellationToken::new();
    let harvester = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move { scheduler.run(cancel, &TracingHarvestReporter).await }
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // The harvester finishes its current cycle before stopping.
    cancel.cancel();
    harvester.await?;

    Ok(served?)
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for CTRL+C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
