pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod scheduler;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cache::{CacheStore, PersistReport, SnapshotCache};
pub use config::HarvestConfig;
pub use error::{AppError, FailureKind};
pub use models::{Article, LatestArticles, RawItem, Source, UpsertOutcome, parse_timestamp};
pub use normalize::{normalize, normalize_batch};
pub use scheduler::{
    CycleReport, HarvestEvent, HarvestReporter, HarvestScheduler, SchedulerState, SourceOutcome,
    TracingHarvestReporter,
};
pub use store::MemoryArticleStore;
pub use traits::{
    ArticleStore, ElementSnapshot, Fetcher, PageRenderer, RenderedPage,
    SourceAdapter, TimeResolver,
};
