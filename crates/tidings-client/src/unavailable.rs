use std::time::Duration;

use tidings_core::error::AppError;
use tidings_core::traits::{ElementSnapshot, PageRenderer, RenderedPage};

/// Renderer for builds without the `browser` feature; every open fails, so
/// rendered sources are reported as failing instead of silently missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

/// Uninhabited: no page can ever be opened.
pub enum NoPage {}

impl PageRenderer for UnavailableRenderer {
    type Page = NoPage;

    async fn open(&self, url: &str) -> Result<NoPage, AppError> {
        Err(AppError::BrowserError(format!(
            "Cannot render {url}: built without the `browser` feature"
        )))
    }
}

impl RenderedPage for NoPage {
    async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<(), AppError> {
        match *self {}
    }

    async fn query_all(
        &self,
        _selector: &str,
        _attributes: &[&str],
        _limit: usize,
    ) -> Result<Vec<ElementSnapshot>, AppError> {
        match *self {}
    }

    async fn close(self) {
        match self {}
    }
}
