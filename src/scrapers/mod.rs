//! Site scrapers: discovery, fetching and extraction for each news site.
//!
//! Each site plugs two capabilities into the pipeline:
//!
//! 1. A [`Getter`]: discovers article [`Source`]s and fetches their raw content
//! 2. A [`Parser`]: turns raw HTML into plain text and reports statistics
//!
//! # Supported Sites
//!
//! | Site | Module | Discovery | Content container |
//! |------|--------|-----------|-------------------|
//! | Habr | [`habr`] | Sitemap index, `articles` sub-sitemaps only | `div.article-body` and fallbacks |
//! | RBC | [`rbc`] | Sitemap index or category page | `div.article__text` |
//!
//! Sites form a closed registry: [`SiteKind`] names them and
//! [`SiteKind::build`] constructs the matching getter and parser.

pub mod extract;
pub mod fetch;
pub mod habr;
pub mod rbc;
pub mod stats;

use crate::config::SiteSettings;
use crate::error::{ConfigError, SitemapError};
use crate::http::PageFetcher;
use crate::models::{ParsedScrap, Scrap, SiteConfig, Source};
use crate::rate_limiter::{Clock, RateLimiter, TokioClock};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::str::FromStr;

pub use extract::ContentExtractor;
pub use stats::ParsedStats;

/// Discovers sources and fetches their raw content.
pub trait Getter {
    /// Produce the candidate article references, deduplicated on path.
    async fn fetch_sources(&self) -> Result<Vec<Source>, SitemapError>;

    /// Fetch raw content for each source; failed fetches are dropped.
    async fn fetch_scrap(&self, sources: Vec<Source>) -> Vec<Scrap>;
}

/// Extracts plain text from fetched pages.
pub trait Parser {
    /// One [`ParsedScrap`] per input [`Scrap`].
    fn parse_scrap(&self, scrap: Vec<Scrap>) -> Vec<ParsedScrap>;

    /// Report on a fetched batch; returns its size.
    fn info_scrap(&self, scrap: &[Scrap]) -> usize;

    /// Report on a parsed batch; `None` for an empty batch.
    fn info_parsed_scrap(&self, parsed: &[ParsedScrap]) -> Option<ParsedStats>;
}

/// State shared by every network call a site's getter makes.
#[derive(Debug)]
pub struct SiteContext<F, C = TokioClock> {
    pub fetcher: F,
    pub limiter: RateLimiter<C>,
    pub config: SiteConfig,
    pub local_offset: FixedOffset,
    /// Stand-in for missing `lastmod` values, fixed when the getter is built.
    pub now: DateTime<Utc>,
}

impl<F: PageFetcher> SiteContext<F> {
    pub fn new(fetcher: F, config: SiteConfig, local_offset: FixedOffset) -> Self {
        Self {
            fetcher,
            limiter: RateLimiter::new(config.crawl_delay),
            config,
            local_offset,
            now: Utc::now(),
        }
    }
}

impl<F: PageFetcher, C: Clock> SiteContext<F, C> {
    #[cfg(test)]
    pub fn with_clock(
        fetcher: F,
        config: SiteConfig,
        local_offset: FixedOffset,
        clock: C,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fetcher,
            limiter: RateLimiter::with_clock(config.crawl_delay, clock),
            config,
            local_offset,
            now,
        }
    }

    pub async fn fetch_scrap(&self, sources: Vec<Source>) -> Vec<Scrap> {
        fetch::fetch_all(&self.fetcher, &self.limiter, sources).await
    }
}

/// The sites this crawler knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum SiteKind {
    Habr,
    Rbc,
}

impl SiteKind {
    pub const ALL: [SiteKind; 2] = [SiteKind::Habr, SiteKind::Rbc];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteKind::Habr => "habr",
            SiteKind::Rbc => "rbc",
        }
    }

    /// Construct the getter and parser registered for this site.
    pub fn build<F: PageFetcher>(
        self,
        fetcher: F,
        settings: &SiteSettings,
    ) -> Result<(SiteGetter<F>, ContentExtractor), ConfigError> {
        let config = settings.site_config()?;
        let ctx = SiteContext::new(fetcher, config, settings.local_offset()?);
        let built = match self {
            SiteKind::Habr => (
                SiteGetter::Habr(habr::HabrGetter::new(ctx, &settings.discovery)?),
                ContentExtractor::new(&habr::PROFILE)?,
            ),
            SiteKind::Rbc => (
                SiteGetter::Rbc(rbc::RbcGetter::new(ctx, &settings.discovery)),
                ContentExtractor::new(&rbc::PROFILE)?,
            ),
        };
        Ok(built)
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SiteKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown site {s:?}")))
    }
}

/// A site's getter, dispatched by [`SiteKind`].
#[derive(Debug)]
pub enum SiteGetter<F, C = TokioClock> {
    Habr(habr::HabrGetter<F, C>),
    Rbc(rbc::RbcGetter<F, C>),
}

impl<F: PageFetcher, C: Clock> Getter for SiteGetter<F, C> {
    async fn fetch_sources(&self) -> Result<Vec<Source>, SitemapError> {
        match self {
            SiteGetter::Habr(getter) => getter.fetch_sources().await,
            SiteGetter::Rbc(getter) => getter.fetch_sources().await,
        }
    }

    async fn fetch_scrap(&self, sources: Vec<Source>) -> Vec<Scrap> {
        match self {
            SiteGetter::Habr(getter) => getter.fetch_scrap(sources).await,
            SiteGetter::Rbc(getter) => getter.fetch_scrap(sources).await,
        }
    }
}
