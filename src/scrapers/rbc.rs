//! RBC article scraper.
//!
//! RBC can be crawled two ways, chosen in configuration:
//!
//! - **Sitemap**: walk `https://www.rbc.ru/sitemap_index.xml` like any other
//!   sitemap site; every sub-sitemap is accepted.
//! - **Category**: read the latest article links from a quote category page
//!   such as `https://www.rbc.ru/quote/category/Invest/`. Category pages carry
//!   no modification times, so these sources are stamped with the crawl time
//!   and are not window-filtered.
//!
//! Article bodies live in `div.article__text`.

use super::extract::ExtractionProfile;
use super::{Getter, SiteContext};
use crate::config::Discovery;
use crate::error::SitemapError;
use crate::http::PageFetcher;
use crate::models::{Scrap, Source};
use crate::rate_limiter::{Clock, TokioClock};
use crate::sitemap::SitemapDiscoverer;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const SITEMAP_INDEX_URL: &str = "https://www.rbc.ru/sitemap_index.xml";
pub const CATEGORY_BASE_URL: &str = "https://www.rbc.ru/quote/category/";

pub const PROFILE: ExtractionProfile = ExtractionProfile {
    site: "rbc",
    containers: &["div.article__text"],
    blocks: &["h1", "h2", "h3", "h4", "h5", "h6", "p"],
};

static CATEGORY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.q-item__link[href]").expect("category link selector is valid"));

/// Quote categories that can be listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RbcCategory {
    #[default]
    #[serde(rename = "all", alias = "All")]
    All,
    #[serde(rename = "Invest", alias = "invest")]
    Invest,
}

impl RbcCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RbcCategory::All => "all",
            RbcCategory::Invest => "Invest",
        }
    }

    pub fn url(&self) -> String {
        format!("{CATEGORY_BASE_URL}{}/", urlencoding::encode(self.as_str()))
    }
}

impl fmt::Display for RbcCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovery strategy resolved for RBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbcDiscovery {
    Sitemap,
    Category(RbcCategory),
}

impl From<&Discovery> for RbcDiscovery {
    fn from(discovery: &Discovery) -> Self {
        match discovery {
            Discovery::Sitemap => RbcDiscovery::Sitemap,
            Discovery::Category { category } => RbcDiscovery::Category(*category),
        }
    }
}

/// Absolute, deduplicated article links found on a category page.
pub fn category_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(&CATEGORY_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href.trim()).ok())
        .map(|url| url.to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[derive(Debug)]
pub struct RbcGetter<F, C = TokioClock> {
    ctx: SiteContext<F, C>,
    discovery: RbcDiscovery,
}

impl<F: PageFetcher, C: Clock> RbcGetter<F, C> {
    pub fn new(ctx: SiteContext<F, C>, discovery: &Discovery) -> Self {
        Self {
            ctx,
            discovery: discovery.into(),
        }
    }

    async fn sources_from_sitemap(&self) -> Result<Vec<Source>, SitemapError> {
        SitemapDiscoverer::new(
            &self.ctx.fetcher,
            &self.ctx.limiter,
            &self.ctx.config,
            self.ctx.local_offset,
            self.ctx.now,
        )
        .discover(SITEMAP_INDEX_URL, |_| true)
        .await
    }

    /// Latest article links of a category.
    ///
    /// A page that cannot be fetched yields no sources rather than an error.
    #[instrument(level = "info", skip(self))]
    async fn sources_from_category(&self, category: RbcCategory) -> Vec<Source> {
        let page_url = category.url();
        info!(%page_url, "Listing category");

        let html = match self
            .ctx
            .limiter
            .limited(self.ctx.fetcher.get_text(&page_url))
            .await
        {
            Ok(html) => html,
            Err(e) => {
                error!(%page_url, error = %e, "Could not get articles from category");
                return Vec::new();
            }
        };
        let Ok(base) = Url::parse(&page_url) else {
            error!(%page_url, "Category URL is not absolute");
            return Vec::new();
        };

        let mut sources: Vec<Source> = category_links(&html, &base)
            .into_iter()
            .inspect(|url| debug!(%url, "Fetched link from category"))
            .map(|url| Source::new(url, self.ctx.now))
            .collect();
        if let Some(limit) = self.ctx.config.doc_limit {
            sources.truncate(limit);
        }
        info!(articles = sources.len(), "Category discovery finished");
        sources
    }
}

impl<F: PageFetcher, C: Clock> Getter for RbcGetter<F, C> {
    #[instrument(level = "info", skip_all, fields(site = "rbc", discovery = ?self.discovery))]
    async fn fetch_sources(&self) -> Result<Vec<Source>, SitemapError> {
        match self.discovery {
            RbcDiscovery::Sitemap => self.sources_from_sitemap().await,
            RbcDiscovery::Category(category) => Ok(self.sources_from_category(category).await),
        }
    }

    #[instrument(level = "info", skip_all, fields(site = "rbc"))]
    async fn fetch_scrap(&self, sources: Vec<Source>) -> Vec<Scrap> {
        self.ctx.fetch_scrap(sources).await
    }
}
