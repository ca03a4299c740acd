#[cfg(feature = "browser")]
pub mod browser;
pub mod fetcher;
pub mod sources;
pub mod time_resolver;
pub mod unavailable;

#[cfg(feature = "browser")]
pub use browser::{ChromiumPage, ChromiumRenderer};
pub use fetcher::ReqwestFetcher;
pub use sources::{
    ItemRule, NewsAdapter, RenderedAdapter, SiteProfile, StaticAdapter, adapter_for,
    adapters_for, default_adapters,
};
pub use time_resolver::{HttpTimeResolver, extract_published_at};
pub use unavailable::{NoPage, UnavailableRenderer};

/// Renderer used for rendered outlets in this build.
#[cfg(feature = "browser")]
pub type DefaultRenderer = ChromiumRenderer;
#[cfg(not(feature = "browser"))]
pub type DefaultRenderer = UnavailableRenderer;

/// Adapter type wired by the server and CLI.
pub type LiveAdapter =
    NewsAdapter<ReqwestFetcher, HttpTimeResolver<ReqwestFetcher>, DefaultRenderer>;

/// Build the live adapters for `sources` from the harvest configuration.
pub fn live_adapters(
    sources: &[tidings_core::Source],
    config: &tidings_core::HarvestConfig,
) -> Result<Vec<LiveAdapter>, tidings_core::AppError> {
    let fetcher = ReqwestFetcher::from_config(config)?;
    let resolver = HttpTimeResolver::new(fetcher.clone());
    Ok(adapters_for(
        sources,
        config,
        fetcher,
        resolver,
        DefaultRenderer::default(),
    ))
}
