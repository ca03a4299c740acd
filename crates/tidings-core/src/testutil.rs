//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{Article, RawItem, Source, UpsertOutcome};
use crate::scheduler::{HarvestEvent, HarvestReporter};
use crate::traits::{
    ArticleStore, ElementSnapshot, Fetcher, PageRenderer, RenderedPage, SourceAdapter,
    TimeResolver,
};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MockResponse {
    Body(String),
    Status(u16),
    Timeout,
}

/// Mock fetcher serving canned pages by URL.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, MockResponse>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set(url, MockResponse::Body(html.to_string()));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.fail_with_status(url, status);
        self
    }

    pub fn with_timeout(self, url: &str) -> Self {
        self.set(url, MockResponse::Timeout);
        self
    }

    /// Make `url` answer with `status` from now on, for this fetcher and
    /// every clone of it.
    pub fn fail_with_status(&self, url: &str, status: u16) {
        self.set(url, MockResponse::Status(status));
    }

    fn set(&self, url: &str, response: MockResponse) {
        self.pages.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let response = self.pages.lock().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Body(html)) => Ok(html),
            Some(MockResponse::Status(status)) => {
                Err(AppError::HttpError(format!("HTTP {status} for {url}")))
            }
            Some(MockResponse::Timeout) => Err(AppError::Timeout(5)),
            None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockTimeResolver
// ---------------------------------------------------------------------------

/// Mock resolver with per-URL answers; everything else is not found.
#[derive(Clone, Default)]
pub struct MockTimeResolver {
    times: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockTimeResolver {
    /// Resolver that never finds a timestamp.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn with_time(self, url: &str, time: DateTime<Utc>) -> Self {
        self.times.lock().unwrap().insert(url.to_string(), time);
        self
    }
}

impl TimeResolver for MockTimeResolver {
    async fn resolve(&self, article_url: &str) -> Option<DateTime<Utc>> {
        self.calls.lock().unwrap().push(article_url.to_string());
        self.times.lock().unwrap().get(article_url).copied()
    }
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Mock adapter that replays a queue of harvest results.
///
/// Once the queue is drained every call returns an empty success.
#[derive(Clone)]
pub struct MockAdapter {
    source: Source,
    responses: Arc<Mutex<Vec<Result<Vec<RawItem>, AppError>>>>,
    panic_message: Option<&'static str>,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(source: Source, items: Vec<RawItem>) -> Self {
        Self::with_responses(source, vec![Ok(items)])
    }

    pub fn with_responses(source: Source, responses: Vec<Result<Vec<RawItem>, AppError>>) -> Self {
        Self {
            source,
            responses: Arc::new(Mutex::new(responses)),
            panic_message: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adapter whose harvest panics.
    pub fn panicking(source: Source, message: &'static str) -> Self {
        Self {
            panic_message: Some(message),
            ..Self::with_responses(source, Vec::new())
        }
    }

    /// Sleep for `delay` inside every harvest.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue another result behind the existing ones.
    pub fn push_response(&self, response: Result<Vec<RawItem>, AppError>) {
        self.responses.lock().unwrap().push(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceAdapter for MockAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn harvest(&self) -> Result<Vec<RawItem>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.panic_message {
            panic!("{message}");
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// Persistent tier that rejects every operation.
#[derive(Clone)]
pub struct FailingStore {
    message: String,
    pub attempts: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ArticleStore for FailingStore {
    async fn upsert(&self, _article: &Article) -> Result<UpsertOutcome, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::DatabaseError(self.message.clone()))
    }

    async fn latest(&self, _source: Source, _limit: usize) -> Result<Vec<Article>, AppError> {
        Err(AppError::DatabaseError(self.message.clone()))
    }

    async fn count(&self, _source: Source) -> Result<u64, AppError> {
        Err(AppError::DatabaseError(self.message.clone()))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Err(AppError::DatabaseError(self.message.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Mock headless browser. Tracks how many sessions were opened and closed.
#[derive(Clone, Default)]
pub struct MockRenderer {
    elements: Arc<Mutex<Option<Vec<ElementSnapshot>>>>,
    open_error: Arc<Mutex<Option<AppError>>>,
    query_error: Arc<Mutex<Option<AppError>>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub visited: Arc<Mutex<Vec<String>>>,
    /// `limit` argument of every query.
    pub query_limits: Arc<Mutex<Vec<usize>>>,
}

impl MockRenderer {
    /// Pages render the marker and expose `elements`.
    pub fn with_elements(elements: Vec<ElementSnapshot>) -> Self {
        let renderer = Self::default();
        *renderer.elements.lock().unwrap() = Some(elements);
        renderer
    }

    /// Pages never render the marker element.
    pub fn never_renders() -> Self {
        Self::default()
    }

    pub fn with_open_error(error: AppError) -> Self {
        let renderer = Self::default();
        *renderer.open_error.lock().unwrap() = Some(error);
        renderer
    }

    /// Marker renders, but querying elements fails.
    pub fn with_query_error(error: AppError) -> Self {
        let renderer = Self::with_elements(Vec::new());
        *renderer.query_error.lock().unwrap() = Some(error);
        renderer
    }

    /// Number of sessions opened but not yet closed.
    pub fn leaked(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

impl PageRenderer for MockRenderer {
    type Page = MockPage;

    async fn open(&self, url: &str) -> Result<MockPage, AppError> {
        if let Some(e) = self.open_error.lock().unwrap().take() {
            return Err(e);
        }
        self.visited.lock().unwrap().push(url.to_string());
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage {
            elements: self.elements.lock().unwrap().clone(),
            query_error: self.query_error.lock().unwrap().take(),
            closed: Arc::clone(&self.closed),
            query_limits: Arc::clone(&self.query_limits),
        })
    }
}

pub struct MockPage {
    elements: Option<Vec<ElementSnapshot>>,
    query_error: Option<AppError>,
    closed: Arc<AtomicUsize>,
    query_limits: Arc<Mutex<Vec<usize>>>,
}

impl RenderedPage for MockPage {
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        match &self.elements {
            Some(_) => Ok(()),
            None => Err(AppError::RenderTimeout {
                selector: selector.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn query_all(
        &self,
        _selector: &str,
        _attributes: &[&str],
        limit: usize,
    ) -> Result<Vec<ElementSnapshot>, AppError> {
        self.query_limits.lock().unwrap().push(limit);
        if let Some(e) = &self.query_error {
            return Err(AppError::BrowserError(e.to_string()));
        }
        let mut elements = self.elements.clone().unwrap_or_default();
        elements.truncate(limit);
        Ok(elements)
    }

    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock harvest reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl HarvestReporter for MockReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        let label = match &event {
            HarvestEvent::Started { .. } => "Started".to_string(),
            HarvestEvent::CycleStarted { .. } => "CycleStarted".to_string(),
            HarvestEvent::SourceHarvested { source, .. } => format!("SourceHarvested:{source}"),
            HarvestEvent::SourceFailed { source, .. } => format!("SourceFailed:{source}"),
            HarvestEvent::SourcePanicked { source, .. } => format!("SourcePanicked:{source}"),
            HarvestEvent::StoreFailed { source, .. } => format!("StoreFailed:{source}"),
            HarvestEvent::CycleCompleted { .. } => "CycleCompleted".to_string(),
            HarvestEvent::CycleAborted { .. } => "CycleAborted".to_string(),
            HarvestEvent::Stopped => "Stopped".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Element as the rendered CNN listing exposes it.
pub fn make_element(text: &str, href: &str, card_name: Option<&str>) -> ElementSnapshot {
    let mut attributes = HashMap::new();
    attributes.insert("href".to_string(), href.to_string());
    if let Some(name) = card_name {
        attributes.insert("data-zjs-card_name".to_string(), name.to_string());
    }
    ElementSnapshot {
        text: text.to_string(),
        attributes,
    }
}
