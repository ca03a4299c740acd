use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tidings_core::error::AppError;
use tidings_core::traits::{ElementSnapshot, PageRenderer, RenderedPage};
use tokio::sync::Mutex;

const MARKER_POLL: Duration = Duration::from_millis(250);

/// Holds at most one launched handle and relaunches after a discard.
struct LaunchSlot<B> {
    current: Mutex<Option<Arc<B>>>,
}

impl<B> Default for LaunchSlot<B> {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }
}

impl<B> LaunchSlot<B> {
    /// Return the live handle, calling `launch` when there is none.
    async fn get_or_launch<F, Fut>(&self, launch: F) -> Result<Arc<B>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<B, AppError>>,
    {
        let mut current = self.current.lock().await;
        if let Some(handle) = current.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(launch().await?);
        *current = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Forget `stale` so the next call relaunches. A handle that already
    /// replaced it is left alone.
    async fn discard(&self, stale: &Arc<B>) {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|live| Arc::ptr_eq(live, stale)) {
            *current = None;
        }
    }
}

/// Headless Chromium driven over the Chrome DevTools Protocol.
///
/// The browser process is launched on first use and shared by all clones;
/// each [`PageRenderer::open`] call gets its own tab. A launch failure is
/// returned to the caller and retried on the next open. When the browser
/// stops accepting tabs it is dropped and relaunched on the next open.
#[derive(Clone, Default)]
pub struct ChromiumRenderer {
    browser: Arc<LaunchSlot<Browser>>,
}

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn browser(&self) -> Result<Arc<Browser>, AppError> {
        self.browser.get_or_launch(Self::launch).await
    }

    async fn launch() -> Result<Browser, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Locate a Chrome/Chromium binary, honouring `CHROME_BIN` first.
    ///
    /// Snap's `/snap/bin/chromium` wrapper drops unknown flags, so the real
    /// binary inside the snap is preferred over it.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        [
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    }
}

impl PageRenderer for ChromiumRenderer {
    type Page = ChromiumPage;

    async fn open(&self, url: &str) -> Result<ChromiumPage, AppError> {
        let browser = self.browser().await?;
        match browser.new_page(url).await {
            Ok(page) => Ok(ChromiumPage { page }),
            Err(e) => {
                tracing::warn!(error = %e, "Browser rejected a new tab; relaunching on next open");
                self.browser.discard(&browser).await;
                Err(AppError::BrowserError(format!(
                    "Failed to navigate to {url}: {e}"
                )))
            }
        }
    }
}

/// One browser tab.
pub struct ChromiumPage {
    page: Page,
}

impl RenderedPage for ChromiumPage {
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        let present = tokio::time::timeout(timeout, async {
            while self.page.find_element(selector).await.is_err() {
                tokio::time::sleep(MARKER_POLL).await;
            }
        })
        .await;

        present.map_err(|_| AppError::RenderTimeout {
            selector: selector.to_string(),
            secs: timeout.as_secs(),
        })
    }

    async fn query_all(
        &self,
        selector: &str,
        attributes: &[&str],
        limit: usize,
    ) -> Result<Vec<ElementSnapshot>, AppError> {
        let mut elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| AppError::BrowserError(format!("Query '{selector}' failed: {e}")))?;
        // Each element read below is a CDP round-trip.
        elements.truncate(limit);

        let mut snapshots = Vec::with_capacity(elements.len());
        for element in elements {
            let text = element
                .inner_text()
                .await
                .map_err(|e| AppError::BrowserError(e.to_string()))?
                .unwrap_or_default();

            let mut values = HashMap::new();
            for name in attributes {
                let value = element
                    .attribute(*name)
                    .await
                    .map_err(|e| AppError::BrowserError(e.to_string()))?;
                if let Some(value) = value {
                    values.insert((*name).to_string(), value);
                }
            }

            snapshots.push(ElementSnapshot {
                text,
                attributes: values,
            });
        }

        Ok(snapshots)
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::warn!(error = %e, "Failed to close browser tab");
        }
    }
}
