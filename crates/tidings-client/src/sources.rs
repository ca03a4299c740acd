//! Outlet adapters.
//!
//! Static outlets share one [`StaticAdapter`] parameterised by a
//! [`SiteProfile`]; CNN's JavaScript-rendered listing goes through
//! [`RenderedAdapter`]. [`NewsAdapter`] unifies both for the scheduler.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use tidings_core::config::HarvestConfig;
use tidings_core::error::AppError;
use tidings_core::models::{RawItem, Source};
use tidings_core::traits::{Fetcher, PageRenderer, RenderedPage, SourceAdapter, TimeResolver};
use url::Url;

/// Article pages fetched at once while resolving publish times.
const TIME_LOOKUP_CONCURRENCY: usize = 4;

/// How headlines are located in a listing document.
#[derive(Debug, Clone)]
pub enum ItemRule {
    /// Every matching anchor is a headline; its text is the title.
    Anchors(&'static str),
    /// Items inside a single container, with title and link in child elements.
    Nested {
        container: &'static str,
        item: &'static str,
        title: &'static str,
        link: &'static str,
    },
}

/// Outlet-specific configuration for a static listing page.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub source: Source,
    /// Base for resolving relative links.
    pub origin: &'static str,
    pub listing_url: &'static str,
    pub rule: ItemRule,
    /// Links containing any of these fragments are not articles.
    pub excluded_paths: &'static [&'static str],
    pub limit: Option<usize>,
}

impl SiteProfile {
    pub fn cnbc() -> Self {
        Self {
            source: Source::Cnbc,
            origin: "https://www.cnbc.com",
            listing_url: "https://www.cnbc.com/world/",
            rule: ItemRule::Anchors("a.LatestNews-headline"),
            excluded_paths: &[],
            limit: None,
        }
    }

    pub fn fox_business() -> Self {
        Self {
            source: Source::FoxBusiness,
            origin: "https://www.foxbusiness.com",
            listing_url: "https://www.foxbusiness.com/",
            rule: ItemRule::Anchors("h2 a[href]"),
            excluded_paths: &["/category/", "/tags/"],
            limit: None,
        }
    }

    pub fn yahoo() -> Self {
        Self {
            source: Source::Yahoo,
            origin: "https://finance.yahoo.com",
            listing_url: "https://finance.yahoo.com/",
            rule: ItemRule::Nested {
                container: "div.hero-headlines.hero-latest-news",
                item: "li.story-item",
                title: "h3",
                link: "a[href]",
            },
            excluded_paths: &[],
            limit: None,
        }
    }

    pub fn cbs(limit: usize) -> Self {
        Self {
            source: Source::Cbs,
            origin: "https://www.cbsnews.com",
            listing_url: "https://www.cbsnews.com/latest/",
            rule: ItemRule::Anchors("article.item a"),
            excluded_paths: &[],
            limit: Some(limit),
        }
    }

    /// Extract headlines from a listing document.
    ///
    /// A missing container or a page with no matching headlines is a
    /// [`AppError::ParseError`].
    pub fn parse_listing(&self, html: &str) -> Result<Vec<RawItem>, AppError> {
        let origin = Url::parse(self.origin)
            .map_err(|e| AppError::ParseError(format!("Invalid origin {}: {e}", self.origin)))?;
        let document = Html::parse_document(html);

        let candidates: Vec<(String, Option<&str>)> = match &self.rule {
            ItemRule::Anchors(css) => document
                .select(&selector(css)?)
                .map(|anchor| (text_of(anchor), anchor.value().attr("href")))
                .collect(),
            ItemRule::Nested {
                container,
                item,
                title,
                link,
            } => {
                let container = document.select(&selector(container)?).next().ok_or_else(|| {
                    AppError::ParseError(format!("{}: container '{container}' not found", self.source))
                })?;
                let (item, title, link) = (selector(item)?, selector(title)?, selector(link)?);
                container
                    .select(&item)
                    .filter_map(|el| {
                        let title = el.select(&title).next()?;
                        let link = el.select(&link).next()?;
                        Some((text_of(title), link.value().attr("href")))
                    })
                    .collect()
            }
        };

        let mut seen = HashSet::new();
        let mut items: Vec<RawItem> = candidates
            .into_iter()
            .filter(|(title, _)| !title.is_empty())
            .filter_map(|(title, href)| Some(RawItem::new(title, resolve_link(&origin, href?)?)))
            .filter(|item| {
                !self
                    .excluded_paths
                    .iter()
                    .any(|fragment| item.link.contains(fragment))
            })
            // Outlets repeat headlines across sections; keep the first.
            .filter(|item| seen.insert(item.link.clone()))
            .collect();

        if let Some(limit) = self.limit {
            items.truncate(limit);
        }

        if items.is_empty() {
            return Err(AppError::ParseError(format!(
                "{}: no headlines matched on {}",
                self.source, self.listing_url
            )));
        }
        Ok(items)
    }
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ParseError(format!("Bad selector '{css}': {e}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolve `href` against `origin`, keeping only web links.
fn resolve_link(origin: &Url, href: &str) -> Option<String> {
    let resolved = origin.join(href.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Adapter for outlets whose listing is plain server-rendered HTML.
#[derive(Clone)]
pub struct StaticAdapter<F: Fetcher, T: TimeResolver> {
    profile: SiteProfile,
    fetcher: F,
    resolver: T,
}

impl<F: Fetcher, T: TimeResolver> StaticAdapter<F, T> {
    pub fn new(profile: SiteProfile, fetcher: F, resolver: T) -> Self {
        Self {
            profile,
            fetcher,
            resolver,
        }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }
}

impl<F: Fetcher, T: TimeResolver> SourceAdapter for StaticAdapter<F, T> {
    fn source(&self) -> Source {
        self.profile.source
    }

    async fn harvest(&self) -> Result<Vec<RawItem>, AppError> {
        let html = self.fetcher.fetch(self.profile.listing_url).await?;
        let items = self.profile.parse_listing(&html)?;
        tracing::debug!(source = %self.profile.source, count = items.len(), "Parsed listing");

        // One lookup per article; `buffered` keeps listing order.
        let items: Vec<RawItem> = stream::iter(items)
            .map(|item| async move {
                match self.resolver.resolve(&item.link).await {
                    Some(published_at) => item.with_published_at(published_at),
                    None => item,
                }
            })
            .buffered(TIME_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        Ok(items)
    }
}

/// Adapter for a JavaScript-rendered listing, driven through a headless
/// browser session.
#[derive(Clone)]
pub struct RenderedAdapter<P: PageRenderer> {
    source: Source,
    origin: &'static str,
    listing_url: &'static str,
    /// Marker to wait for; also selects the headline anchors.
    selector: &'static str,
    /// Attribute preferred over visible text for the title.
    title_attribute: &'static str,
    limit: usize,
    wait_timeout: Duration,
    renderer: P,
}

impl<P: PageRenderer> RenderedAdapter<P> {
    pub fn cnn(renderer: P, limit: usize, wait_timeout: Duration) -> Self {
        Self {
            source: Source::Cnn,
            origin: "https://edition.cnn.com",
            listing_url: "https://edition.cnn.com/world",
            selector: "a.container__link--type-article",
            title_attribute: "data-zjs-card_name",
            limit,
            wait_timeout,
            renderer,
        }
    }

    async fn extract(&self, page: &P::Page) -> Result<Vec<RawItem>, AppError> {
        page.wait_for(self.selector, self.wait_timeout).await?;
        let elements = page
            .query_all(self.selector, &["href", self.title_attribute], self.limit)
            .await?;

        let origin = Url::parse(self.origin)
            .map_err(|e| AppError::ParseError(format!("Invalid origin {}: {e}", self.origin)))?;
        // Per-article times are not exposed by the render pass.
        let rendered_at = Utc::now();

        let items: Vec<RawItem> = elements
            .into_iter()
            .take(self.limit)
            .filter_map(|el| {
                let title = el
                    .attr(self.title_attribute)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| el.text.trim())
                    .to_string();
                let link = resolve_link(&origin, el.attr("href")?)?;
                Some(RawItem::new(title, link).with_published_at(rendered_at))
            })
            .collect();

        if items.is_empty() {
            return Err(AppError::ParseError(format!(
                "{}: no usable anchors on {}",
                self.source, self.listing_url
            )));
        }
        Ok(items)
    }
}

impl<P: PageRenderer> SourceAdapter for RenderedAdapter<P> {
    fn source(&self) -> Source {
        self.source
    }

    async fn harvest(&self) -> Result<Vec<RawItem>, AppError> {
        let page = self.renderer.open(self.listing_url).await?;
        let result = self.extract(&page).await;
        page.close().await;
        result
    }
}

/// Any configured outlet adapter.
#[derive(Clone)]
pub enum NewsAdapter<F, T, P>
where
    F: Fetcher,
    T: TimeResolver,
    P: PageRenderer,
{
    Static(StaticAdapter<F, T>),
    Rendered(RenderedAdapter<P>),
}

impl<F, T, P> SourceAdapter for NewsAdapter<F, T, P>
where
    F: Fetcher,
    T: TimeResolver,
    P: PageRenderer,
{
    fn source(&self) -> Source {
        match self {
            NewsAdapter::Static(adapter) => adapter.source(),
            NewsAdapter::Rendered(adapter) => adapter.source(),
        }
    }

    async fn harvest(&self) -> Result<Vec<RawItem>, AppError> {
        match self {
            NewsAdapter::Static(adapter) => adapter.harvest().await,
            NewsAdapter::Rendered(adapter) => adapter.harvest().await,
        }
    }
}

/// Build the adapter for one outlet.
pub fn adapter_for<F, T, P>(
    source: Source,
    config: &HarvestConfig,
    fetcher: F,
    resolver: T,
    renderer: P,
) -> NewsAdapter<F, T, P>
where
    F: Fetcher,
    T: TimeResolver,
    P: PageRenderer,
{
    let profile = match source {
        Source::Cnn => {
            return NewsAdapter::Rendered(RenderedAdapter::cnn(
                renderer,
                config.cnn_limit,
                config.render_timeout,
            ));
        }
        Source::Cnbc => SiteProfile::cnbc(),
        Source::FoxBusiness => SiteProfile::fox_business(),
        Source::Yahoo => SiteProfile::yahoo(),
        Source::Cbs => SiteProfile::cbs(config.cbs_limit),
    };
    NewsAdapter::Static(StaticAdapter::new(profile, fetcher, resolver))
}

/// Adapters for the given outlets, in order.
pub fn adapters_for<F, T, P>(
    sources: &[Source],
    config: &HarvestConfig,
    fetcher: F,
    resolver: T,
    renderer: P,
) -> Vec<NewsAdapter<F, T, P>>
where
    F: Fetcher,
    T: TimeResolver,
    P: PageRenderer,
{
    sources
        .iter()
        .map(|source| {
            adapter_for(
                *source,
                config,
                fetcher.clone(),
                resolver.clone(),
                renderer.clone(),
            )
        })
        .collect()
}

/// Adapters for every configured outlet.
pub fn default_adapters<F, T, P>(
    config: &HarvestConfig,
    fetcher: F,
    resolver: T,
    renderer: P,
) -> Vec<NewsAdapter<F, T, P>>
where
    F: Fetcher,
    T: TimeResolver,
    P: PageRenderer,
{
    adapters_for(&Source::ALL, config, fetcher, resolver, renderer)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tidings_core::testutil::{MockFetcher, MockRenderer, MockTimeResolver, make_element};

    use super::*;

    const CNBC_LISTING: &str = r#"<html><body>
        <div class="LatestNews-container">
          <a class="LatestNews-headline" href="/2025/05/06/fed-holds-rates.html">Fed holds rates</a>
          <a class="LatestNews-headline" href="https://www.cnbc.com/2025/05/06/oil.html">  Oil   slips </a>
          <a class="LatestNews-headline">No link</a>
          <a class="Other" href="/ignored.html">Ignored</a>
        </div></body></html>"#;

    const FOX_LISTING: &str = r#"<html><body>
        <h2><a href="/markets/stocks-rally">Stocks rally</a></h2>
        <h2><a href="/category/markets">Markets</a></h2>
        <h2><a href="https://www.foxbusiness.com/tags/economy">Economy</a></h2>
        <h2><a href="/politics/tariff-talks">Tariff talks</a></h2>
        <h3><a href="/not-a-headline">Not a headline</a></h3>
    </body></html>"#;

    const YAHOO_LISTING: &str = r#"<html><body>
        <div class="hero-headlines hero-latest-news yf-36pijq"><ul>
          <li class="story-item"><a href="/news/chip-stocks.html"><h3>Chip stocks surge</h3></a></li>
          <li class="story-item"><h3>Missing link</h3></li>
          <li class="story-item"><a href="https://finance.yahoo.com/news/bonds.html"><h3>Bonds steady</h3></a></li>
        </ul></div></body></html>"#;

    fn cbs_listing(n: usize) -> String {
        let items: String = (1..=n)
            .map(|i| format!(r#"<article class="item"><a href="/news/story-{i}/">Story {i}</a></article>"#))
            .collect();
        format!(
            r#"<html><body><article class="item"><a href="/news/blank/"> </a></article>{items}</body></html>"#
        )
    }

    fn links(items: &[RawItem]) -> Vec<&str> {
        items.iter().map(|i| i.link.as_str()).collect()
    }

    #[test]
    fn cnbc_resolves_relative_links() {
        let items = SiteProfile::cnbc().parse_listing(CNBC_LISTING).unwrap();
        assert_eq!(
            links(&items),
            vec![
                "https://www.cnbc.com/2025/05/06/fed-holds-rates.html",
                "https://www.cnbc.com/2025/05/06/oil.html",
            ]
        );
        assert_eq!(items[0].title, "Fed holds rates");
        assert!(items.iter().all(|i| i.published_at.is_none()));
    }

    #[test]
    fn fox_excludes_category_and_tag_pages() {
        let items = SiteProfile::fox_business().parse_listing(FOX_LISTING).unwrap();
        assert_eq!(
            links(&items),
            vec![
                "https://www.foxbusiness.com/markets/stocks-rally",
                "https://www.foxbusiness.com/politics/tariff-talks",
            ]
        );
    }

    #[test]
    fn yahoo_reads_items_inside_container() {
        let items = SiteProfile::yahoo().parse_listing(YAHOO_LISTING).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Chip stocks surge", "Bonds steady"]);
        assert_eq!(items[0].link, "https://finance.yahoo.com/news/chip-stocks.html");
    }

    #[test]
    fn yahoo_without_container_is_parse_error() {
        let err = SiteProfile::yahoo()
            .parse_listing("<html><body><li class='story-item'><h3>x</h3></li></body></html>")
            .unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
        assert!(err.to_string().contains("container"));
    }

    #[test]
    fn cbs_is_capped_after_dropping_blank_titles() {
        let items = SiteProfile::cbs(15).parse_listing(&cbs_listing(20)).unwrap();
        assert_eq!(items.len(), 15);
        assert_eq!(items[0].title, "Story 1");
        assert_eq!(items[14].link, "https://www.cbsnews.com/news/story-15/");
    }

    #[test]
    fn listing_without_headlines_is_parse_error() {
        let err = SiteProfile::cnbc()
            .parse_listing("<html><body><p>Redesigned!</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn non_web_links_are_skipped() {
        let origin = Url::parse("https://www.cnbc.com").unwrap();
        assert_eq!(resolve_link(&origin, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&origin, "mailto:desk@cnbc.com"), None);
        assert_eq!(
            resolve_link(&origin, "video/clip"),
            Some("https://www.cnbc.com/video/clip".to_string())
        );
    }

    #[tokio::test]
    async fn static_adapter_resolves_each_article_once() {
        let first = "https://www.cnbc.com/2025/05/06/fed-holds-rates.html";
        let published = Utc.with_ymd_and_hms(2025, 5, 6, 9, 15, 0).unwrap();
        let fetcher = MockFetcher::new().with_page("https://www.cnbc.com/world/", CNBC_LISTING);
        let resolver = MockTimeResolver::not_found().with_time(first, published);
        let adapter = StaticAdapter::new(SiteProfile::cnbc(), fetcher, resolver.clone());

        let items = adapter.harvest().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].published_at, Some(published.to_rfc3339()));
        assert_eq!(items[1].published_at, None);
        assert_eq!(resolver.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_headline_is_resolved_once() {
        let listing = r#"<html><body>
            <h2><a href="/markets/stocks-rally">Stocks rally</a></h2>
            <h2><a href="/markets/stocks-rally">Stocks rally (again)</a></h2>
            <h2><a href="https://www.foxbusiness.com/markets/stocks-rally">Stocks rally</a></h2>
        </body></html>"#;
        let fetcher = MockFetcher::new().with_page("https://www.foxbusiness.com/", listing);
        let resolver = MockTimeResolver::not_found();
        let adapter = StaticAdapter::new(SiteProfile::fox_business(), fetcher, resolver.clone());

        let items = adapter.harvest().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Stocks rally");
        assert_eq!(
            resolver.calls.lock().unwrap().as_slice(),
            ["https://www.foxbusiness.com/markets/stocks-rally"]
        );
    }

    #[test]
    fn cap_counts_distinct_articles() {
        let repeated: String = (1..=20)
            .map(|i| {
                let story = format!(r#"<article class="item"><a href="/news/story-{i}/">Story {i}</a></article>"#);
                format!("{story}{story}")
            })
            .collect();
        let html = format!("<html><body>{repeated}</body></html>");

        let items = SiteProfile::cbs(15).parse_listing(&html).unwrap();
        assert_eq!(items.len(), 15);
        assert_eq!(items[14].link, "https://www.cbsnews.com/news/story-15/");
    }

    #[tokio::test]
    async fn static_adapter_surfaces_http_failure() {
        let fetcher = MockFetcher::new().with_status("https://www.cbsnews.com/latest/", 503);
        let adapter = StaticAdapter::new(SiteProfile::cbs(15), fetcher, MockTimeResolver::not_found());

        let err = adapter.harvest().await.unwrap_err();
        assert!(matches!(err, AppError::HttpError(_)));
        assert!(err.is_adapter_local());
    }

    fn cnn(renderer: MockRenderer) -> RenderedAdapter<MockRenderer> {
        RenderedAdapter::cnn(renderer, 30, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn rendered_adapter_prefers_card_name_and_closes_session() {
        let renderer = MockRenderer::with_elements(vec![
            make_element("Visible text", "/2025/05/06/world/quake", Some("Quake hits coast")),
            make_element("  Only text  ", "https://edition.cnn.com/2025/05/06/world/vote", None),
            make_element("Live TV", "javascript:void(0)", Some("")),
        ]);
        let adapter = cnn(renderer.clone());

        let items = adapter.harvest().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Quake hits coast");
        assert_eq!(items[0].link, "https://edition.cnn.com/2025/05/06/world/quake");
        assert_eq!(items[1].title, "Only text");
        assert!(items.iter().all(|i| i.published_at.is_some()));
        assert_eq!(
            renderer.visited.lock().unwrap().as_slice(),
            ["https://edition.cnn.com/world"]
        );
        assert_eq!(renderer.leaked(), 0);
    }

    #[tokio::test]
    async fn rendered_adapter_caps_anchors() {
        let elements = (0..40)
            .map(|i| make_element(&format!("Story {i}"), &format!("/story-{i}"), None))
            .collect();
        let renderer = MockRenderer::with_elements(elements);

        let items = cnn(renderer.clone()).harvest().await.unwrap();
        assert_eq!(items.len(), 30);
        // Elements past the cap are never read back from the page.
        assert_eq!(*renderer.query_limits.lock().unwrap(), vec![30]);
    }

    #[tokio::test]
    async fn render_timeout_still_closes_session() {
        let renderer = MockRenderer::never_renders();
        let err = cnn(renderer.clone()).harvest().await.unwrap_err();

        assert!(matches!(err, AppError::RenderTimeout { secs: 10, .. }));
        assert_eq!(renderer.opened.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(renderer.leaked(), 0);
    }

    #[tokio::test]
    async fn query_failure_still_closes_session() {
        let renderer = MockRenderer::with_query_error(AppError::Generic("target crashed".into()));
        let err = cnn(renderer.clone()).harvest().await.unwrap_err();

        assert!(matches!(err, AppError::BrowserError(_)));
        assert_eq!(renderer.leaked(), 0);
    }

    #[tokio::test]
    async fn open_failure_opens_nothing() {
        let renderer = MockRenderer::with_open_error(AppError::BrowserError("no chrome".into()));
        let err = cnn(renderer.clone()).harvest().await.unwrap_err();

        assert!(matches!(err, AppError::BrowserError(_)));
        assert_eq!(renderer.opened.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn default_adapters_cover_every_source() {
        let adapters = default_adapters(
            &HarvestConfig::default(),
            MockFetcher::new(),
            MockTimeResolver::not_found(),
            MockRenderer::never_renders(),
        );
        let sources: Vec<_> = adapters.iter().map(|a| a.source()).collect();
        assert_eq!(sources, Source::ALL.to_vec());
        assert!(matches!(adapters[0], NewsAdapter::Rendered(_)));
        match &adapters[4] {
            NewsAdapter::Static(cbs) => assert_eq!(cbs.profile().limit, Some(15)),
            NewsAdapter::Rendered(_) => panic!("CBS is a static outlet"),
        }
    }
}
