use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStore, PersistReport};
use crate::error::{AppError, FailureKind};
use crate::models::Source;
use crate::normalize::normalize_batch;
use crate::traits::{ArticleStore, SourceAdapter};

/// Whether a harvest cycle is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Harvesting,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Harvesting => "harvesting",
        }
    }
}

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug)]
pub enum HarvestEvent<'a> {
    Started {
        interval: Duration,
        sources: usize,
    },
    CycleStarted {
        started_at: DateTime<Utc>,
    },
    SourceHarvested {
        source: Source,
        articles: usize,
        persisted: &'a PersistReport,
    },
    SourceFailed {
        source: Source,
        error: &'a AppError,
    },
    SourcePanicked {
        source: Source,
        message: &'a str,
    },
    StoreFailed {
        source: Source,
        failed: usize,
        error: &'a AppError,
    },
    CycleCompleted {
        report: &'a CycleReport,
    },
    CycleAborted {
        message: &'a str,
    },
    Stopped,
}

/// Trait for receiving harvest events (decoupled logging).
pub trait HarvestReporter: Send + Sync {
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHarvestReporter;

impl HarvestReporter for TracingHarvestReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::Started { interval, sources } => {
                tracing::info!(interval_secs = interval.as_secs(), %sources, "Harvester started");
            }
            HarvestEvent::CycleStarted { started_at } => {
                tracing::info!(%started_at, "Harvest cycle started");
            }
            HarvestEvent::SourceHarvested {
                source,
                articles,
                persisted,
            } => {
                tracing::info!(
                    %source,
                    %articles,
                    inserted = persisted.inserted,
                    updated = persisted.updated,
                    "Source updated"
                );
            }
            HarvestEvent::SourceFailed { source, error } => {
                if error.is_adapter_local() {
                    tracing::warn!(%source, kind = %error.kind(), %error, "Source harvest failed; keeping previous snapshot");
                } else {
                    tracing::error!(%source, kind = %error.kind(), %error, "Source harvest failed outside the adapter; keeping previous snapshot");
                }
            }
            HarvestEvent::SourcePanicked { source, message } => {
                tracing::error!(%source, %message, "Source adapter panicked; keeping previous snapshot");
            }
            HarvestEvent::StoreFailed {
                source,
                failed,
                error,
            } => {
                tracing::error!(%source, %failed, %error, "Persisting articles failed");
            }
            HarvestEvent::CycleCompleted { report } => {
                tracing::info!(
                    updated = report.updated(),
                    failed = report.failed(),
                    "Harvest cycle completed"
                );
            }
            HarvestEvent::CycleAborted { message } => {
                tracing::error!(%message, "Harvest cycle aborted");
            }
            HarvestEvent::Stopped => {
                tracing::info!("Harvester stopped");
            }
        }
    }
}

/// What happened to one source during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The RAM snapshot was replaced with `articles` entries.
    Updated {
        articles: usize,
        persisted: PersistReport,
    },
    /// The previous snapshot was kept.
    Failed { kind: FailureKind, error: String },
}

/// Summary of one harvest cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(Source, SourceOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, source: Source) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, outcome)| outcome)
    }

    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SourceOutcome::Updated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.updated()
    }
}

/// Drives every adapter on a fixed cadence and feeds both cache tiers.
pub struct HarvestScheduler<A, S>
where
    A: SourceAdapter,
    S: ArticleStore,
{
    adapters: Vec<A>,
    cache: CacheStore<S>,
    poll_interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl<A, S> HarvestScheduler<A, S>
where
    A: SourceAdapter,
    S: ArticleStore,
{
    /// Only the first adapter per source is kept; later ones are dropped with
    /// a warning so each source has a single writer.
    pub fn new(adapters: Vec<A>, cache: CacheStore<S>, poll_interval: Duration) -> Self {
        let mut seen = HashSet::new();
        let adapters = adapters
            .into_iter()
            .filter(|adapter| {
                let source = adapter.source();
                let first = seen.insert(source);
                if !first {
                    tracing::warn!(%source, "Ignoring duplicate adapter for source");
                }
                first
            })
            .collect();
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            adapters,
            cache,
            poll_interval,
            state,
        }
    }

    pub fn cache(&self) -> &CacheStore<S> {
        &self.cache
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run cycles until cancellation.
    ///
    /// Cycles start `poll_interval` apart; a cycle that overruns delays the
    /// next one instead of stacking. Cancellation is observed between cycles.
    pub async fn run<R: HarvestReporter>(&self, cancel_token: CancellationToken, reporter: &R) {
        reporter.report(HarvestEvent::Started {
            interval: self.poll_interval,
            sources: self.adapters.len(),
        });

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let cycle = AssertUnwindSafe(self.run_cycle(reporter)).catch_unwind();
            if let Err(panic) = cycle.await {
                let message = panic_message(panic.as_ref());
                reporter.report(HarvestEvent::CycleAborted { message: &message });
            }
        }

        reporter.report(HarvestEvent::Stopped);
    }

    /// Run one cycle now.
    pub async fn run_cycle<R: HarvestReporter>(&self, reporter: &R) -> CycleReport {
        self.run_cycle_at(Utc::now(), reporter).await
    }

    /// Run one cycle using `started_at` as the fallback publish instant.
    pub async fn run_cycle_at<R: HarvestReporter>(
        &self,
        started_at: DateTime<Utc>,
        reporter: &R,
    ) -> CycleReport {
        let _harvesting = StateGuard::enter(&self.state);
        reporter.report(HarvestEvent::CycleStarted { started_at });

        let outcomes = join_all(
            self.adapters
                .iter()
                .map(|adapter| self.harvest_source(adapter, started_at, reporter)),
        )
        .await;

        let report = CycleReport {
            started_at,
            outcomes,
        };
        reporter.report(HarvestEvent::CycleCompleted { report: &report });
        report
    }

    async fn harvest_source<R: HarvestReporter>(
        &self,
        adapter: &A,
        started_at: DateTime<Utc>,
        reporter: &R,
    ) -> (Source, SourceOutcome) {
        let source = adapter.source();

        let items = match AssertUnwindSafe(adapter.harvest()).catch_unwind().await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                reporter.report(HarvestEvent::SourceFailed { source, error: &e });
                return (source, failed(&e));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                reporter.report(HarvestEvent::SourcePanicked {
                    source,
                    message: &message,
                });
                return (
                    source,
                    SourceOutcome::Failed {
                        kind: FailureKind::Other,
                        error: message,
                    },
                );
            }
        };

        let articles = normalize_batch(items, source, started_at);
        if articles.is_empty() {
            let e = AppError::ParseError(format!("{source} produced no usable headlines"));
            reporter.report(HarvestEvent::SourceFailed { source, error: &e });
            return (source, failed(&e));
        }

        let count = articles.len();
        self.cache.replace(source, articles.clone()).await;

        let (persisted, store_error) = self.cache.persist(&articles).await;
        if let Some(e) = &store_error {
            reporter.report(HarvestEvent::StoreFailed {
                source,
                failed: persisted.failed,
                error: e,
            });
        }

        reporter.report(HarvestEvent::SourceHarvested {
            source,
            articles: count,
            persisted: &persisted,
        });

        (
            source,
            SourceOutcome::Updated {
                articles: count,
                persisted,
            },
        )
    }
}

fn failed(error: &AppError) -> SourceOutcome {
    SourceOutcome::Failed {
        kind: error.kind(),
        error: error.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Holds `Harvesting` for its lifetime and always falls back to `Idle`,
/// unwinding included.
struct StateGuard<'a> {
    state: &'a watch::Sender<SchedulerState>,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<SchedulerState>) -> Self {
        state.send_replace(SchedulerState::Harvesting);
        Self { state }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SchedulerState::Idle);
    }
}
