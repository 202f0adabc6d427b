//! Habr article scraper.
//!
//! Habr publishes a sitemap index at `https://habr.com/sitemap.xml` whose
//! sub-sitemaps are split by content type. Only sub-sitemaps with `articles`
//! in their URL are walked; hubs, companies and user profiles are skipped.
//!
//! Article pages keep their body in `div.article-body`; older layouts use a
//! `data-article-content` attribute or the `post-content-body` id instead.

use super::extract::ExtractionProfile;
use super::{Getter, SiteContext};
use crate::config::Discovery;
use crate::error::{ConfigError, SitemapError};
use crate::http::PageFetcher;
use crate::models::{Scrap, Source};
use crate::rate_limiter::{Clock, TokioClock};
use crate::sitemap::SitemapDiscoverer;
use tracing::instrument;

pub const SITEMAP_INDEX_URL: &str = "https://habr.com/sitemap.xml";

pub const PROFILE: ExtractionProfile = ExtractionProfile {
    site: "habr",
    containers: &[
        "div.article-body",
        "div[data-article-content]",
        "div#post-content-body",
    ],
    blocks: &[
        "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote", "pre",
    ],
};

/// Whether a sub-sitemap lists articles.
pub fn is_article_sitemap(url: &str) -> bool {
    url.contains("articles")
}

#[derive(Debug)]
pub struct HabrGetter<F, C = TokioClock> {
    ctx: SiteContext<F, C>,
}

impl<F: PageFetcher, C: Clock> HabrGetter<F, C> {
    /// Habr is only crawled through its sitemap.
    pub fn new(ctx: SiteContext<F, C>, discovery: &Discovery) -> Result<Self, ConfigError> {
        match discovery {
            Discovery::Sitemap => Ok(Self { ctx }),
            Discovery::Category { .. } => Err(ConfigError::Invalid(
                "habr supports sitemap discovery only".to_string(),
            )),
        }
    }
}

impl<F: PageFetcher, C: Clock> Getter for HabrGetter<F, C> {
    #[instrument(level = "info", skip_all, fields(site = "habr"))]
    async fn fetch_sources(&self) -> Result<Vec<Source>, SitemapError> {
        SitemapDiscoverer::new(
            &self.ctx.fetcher,
            &self.ctx.limiter,
            &self.ctx.config,
            self.ctx.local_offset,
            self.ctx.now,
        )
        .discover(SITEMAP_INDEX_URL, is_article_sitemap)
        .await
    }

    #[instrument(level = "info", skip_all, fields(site = "habr"))]
    async fn fetch_scrap(&self, sources: Vec<Source>) -> Vec<Scrap> {
        self.ctx.fetch_scrap(sources).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteConfig;
    use crate::scrapers::{ContentExtractor, Parser};
    use crate::testing::{ManualClock, StaticFetcher};
    use chrono::{FixedOffset, TimeZone, Utc};
    use std::time::Duration;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://habr.com/sitemap/articles/1.xml</loc><lastmod>2023-08-01T10:00:00+03:00</lastmod></sitemap>
  <sitemap><loc>https://habr.com/sitemap/hubs.xml</loc><lastmod>2023-08-01T10:00:00+03:00</lastmod></sitemap>
</sitemapindex>"#;

    const ARTICLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://habr.com/ru/articles/1/</loc><lastmod>2023-07-15T12:00:00Z</lastmod></url>
  <url><loc>https://habr.com/ru/articles/2/</loc><lastmod>2022-07-15T12:00:00Z</lastmod></url>
</urlset>"#;

    const ARTICLE: &str = r#"<html><body>
        <h1 class="tm-title"><span>Разбор sitemap на Rust</span></h1>
        <div class="tm-article-body"><div class="article-body">
          <h2>Введение</h2>
          <p>Первый&nbsp;абзац.</p>
          <blockquote>Цитата</blockquote>
        </div></div>
    </body></html>"#;

    fn getter(fetcher: StaticFetcher) -> HabrGetter<StaticFetcher, ManualClock> {
        let config = SiteConfig {
            crawl_delay: Duration::from_secs(1),
            window_start: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
            doc_limit: None,
        };
        let ctx = SiteContext::with_clock(
            fetcher,
            config,
            FixedOffset::east_opt(3 * 3600).unwrap(),
            ManualClock::new(),
            Utc::now(),
        );
        HabrGetter::new(ctx, &Discovery::Sitemap).unwrap()
    }

    #[test]
    fn test_is_article_sitemap() {
        assert!(is_article_sitemap("https://habr.com/sitemap/articles/1.xml"));
        assert!(!is_article_sitemap("https://habr.com/sitemap/hubs.xml"));
    }

    #[tokio::test]
    async fn test_discovers_and_fetches_articles() {
        let fetcher = StaticFetcher::new()
            .with_page(SITEMAP_INDEX_URL, INDEX)
            .with_page("https://habr.com/sitemap/articles/1.xml", ARTICLES)
            .with_page("https://habr.com/ru/articles/1/", ARTICLE);
        let getter = getter(fetcher);

        let sources = getter.fetch_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, "https://habr.com/ru/articles/1/");
        assert!(!getter.ctx.fetcher.was_requested("https://habr.com/sitemap/hubs.xml"));

        let scrap = getter.fetch_scrap(sources).await;
        let parsed = ContentExtractor::new(&PROFILE).unwrap().parse_scrap(scrap);
        assert_eq!(
            parsed[0].text.as_deref(),
            Some("Разбор sitemap на Rust - Введение Первый абзац. Цитата")
        );
    }
}
