use tidings_core::{ArticleStore, CacheStore, HarvestConfig, SchedulerState};
use tokio::sync::watch;

/// Shared application state, available to all route handlers via `State<Arc<AppState<S>>>`.
pub struct AppState<S: ArticleStore> {
    /// Both tiers; the harvester writes, handlers only read.
    pub cache: CacheStore<S>,
    pub config: HarvestConfig,
    pub scheduler: watch::Receiver<SchedulerState>,
}
