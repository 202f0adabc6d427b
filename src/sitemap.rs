//! Two-level sitemap discovery.
//!
//! Sites advertise articles through a sitemap index whose `<sitemap>` entries
//! point at per-section sitemaps, each listing `<url>` entries. Discovery walks
//! both levels, keeps only URLs whose `lastmod` falls inside the crawl window,
//! and deduplicates on the URL.
//!
//! # Pruning
//!
//! Sub-sitemaps are assumed chronologically coarse: when an index entry's
//! `lastmod` is older than the window start, the referenced sub-sitemap is not
//! fetched at all.
//!
//! # Failure isolation
//!
//! Only an unreadable index fails discovery. A sub-sitemap that cannot be
//! fetched or parsed, or an entry with a malformed timestamp, is logged and
//! skipped.

use crate::error::SitemapError;
use crate::http::PageFetcher;
use crate::models::{SiteConfig, Source};
use crate::rate_limiter::{Clock, RateLimiter};
use crate::utils::truncate_for_log;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

static DEFAULT_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+xmlns="[^"]*""#).expect("namespace pattern is valid"));

/// Root of a sitemap index document (`<sitemapindex>`).
#[derive(Debug, Deserialize)]
struct SitemapIndex {
    #[serde(rename = "sitemap", default)]
    entries: Vec<SitemapEntry>,
}

/// Root of a leaf sitemap document (`<urlset>`).
#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    entries: Vec<SitemapEntry>,
}

/// A `<sitemap>` or `<url>` entry; both carry `loc` and `lastmod`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SitemapEntry {
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub lastmod: Option<String>,
}

impl SitemapEntry {
    /// Trimmed, non-empty `loc`.
    pub fn location(&self) -> Option<&str> {
        non_empty(self.loc.as_deref())
    }

    /// Trimmed, non-empty `lastmod`.
    pub fn modified(&self) -> Option<&str> {
        non_empty(self.lastmod.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Remove default-namespace declarations so elements match by bare name.
pub fn strip_default_namespace(xml: &str) -> Cow<'_, str> {
    DEFAULT_NAMESPACE.replace_all(xml, "")
}

fn parse_document<T: DeserializeOwned>(xml: &str) -> Result<T, SitemapError> {
    let xml = strip_default_namespace(xml);
    Ok(quick_xml::de::from_str(&xml)?)
}

/// Parse the `<sitemap>` entries of a sitemap index.
pub fn parse_index(xml: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
    parse_document::<SitemapIndex>(xml).map(|index| index.entries)
}

/// Parse the `<url>` entries of a leaf sitemap.
pub fn parse_urlset(xml: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
    parse_document::<UrlSet>(xml).map(|set| set.entries)
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp as found in sitemaps and configuration.
///
/// A trailing `Z` means `+00:00`. Values without an offset, including bare
/// dates, are read in `local_offset`.
pub fn parse_timestamp(raw: &str, local_offset: FixedOffset) -> Result<DateTime<Utc>, SitemapError> {
    let raw = raw.trim();
    let normalized: Cow<'_, str> = match raw.strip_suffix('Z') {
        Some(stem) => Cow::Owned(format!("{stem}+00:00")),
        None => Cow::Borrowed(raw),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| SitemapError::Timestamp(raw.to_string()))?;

    local_offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| SitemapError::Timestamp(raw.to_string()))
}

/// Resolve an entry's `lastmod`, defaulting to `now` when absent.
pub fn resolve_lastmod(
    raw: Option<&str>,
    now: DateTime<Utc>,
    local_offset: FixedOffset,
) -> Result<DateTime<Utc>, SitemapError> {
    match raw {
        Some(raw) => parse_timestamp(raw, local_offset),
        None => Ok(now),
    }
}

/// Walks a sitemap index for one site.
///
/// Every network call goes through the site's [`RateLimiter`].
pub struct SitemapDiscoverer<'a, F, C> {
    fetcher: &'a F,
    limiter: &'a RateLimiter<C>,
    config: &'a SiteConfig,
    local_offset: FixedOffset,
    now: DateTime<Utc>,
}

impl<'a, F, C> SitemapDiscoverer<'a, F, C>
where
    F: PageFetcher,
    C: Clock,
{
    pub fn new(
        fetcher: &'a F,
        limiter: &'a RateLimiter<C>,
        config: &'a SiteConfig,
        local_offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            config,
            local_offset,
            now,
        }
    }

    /// Collect sources from `index_url`.
    ///
    /// The result keeps discovery order and holds at most `doc_limit`
    /// sources. Reaching the limit stops the walk but still waits out the
    /// crawl delay of the last sub-sitemap request.
    ///
    /// # Arguments
    ///
    /// * `index_url` - URL of the site's sitemap index
    /// * `accept_sitemap` - The site's naming filter on sub-sitemap URLs
    ///
    /// # Returns
    ///
    /// The in-window article sources, or an error if the index itself cannot
    /// be fetched or parsed.
    #[instrument(level = "info", skip(self, accept_sitemap))]
    pub async fn discover(
        &self,
        index_url: &str,
        accept_sitemap: impl Fn(&str) -> bool,
    ) -> Result<Vec<Source>, SitemapError> {
        let index = self
            .limiter
            .limited(self.fetcher.get_text(index_url))
            .await?;
        let index_entries = parse_index(&index).inspect_err(|e| {
            warn!(error = %e, body = %truncate_for_log(&index, 200), "Unreadable sitemap index");
        })?;
        info!(entries = index_entries.len(), "Parsed sitemap index");

        let mut sources = Vec::new();
        let mut seen = HashSet::new();
        let mut sitemap_count = 0usize;

        for entry in &index_entries {
            let Some(sitemap_url) = entry.location() else {
                continue;
            };

            let lastmod = match resolve_lastmod(entry.modified(), self.now, self.local_offset) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(%sitemap_url, error = %e, "Skipping sitemap index entry");
                    continue;
                }
            };
            if lastmod < self.config.window_start {
                debug!(%sitemap_url, %lastmod, "Sub-sitemap older than window; pruned");
                continue;
            }
            if !accept_sitemap(sitemap_url) {
                continue;
            }

            self.limiter.begin();
            let urls = match self.fetch_urlset(sitemap_url).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(%sitemap_url, error = %e, "Failed sitemap; continuing");
                    self.limiter.end().await;
                    continue;
                }
            };
            debug!(%sitemap_url, entries = urls.len(), "Got sitemap");

            sitemap_count += 1;
            if sitemap_count % 10 == 0 {
                info!(sitemaps = sitemap_count, "Processed sitemaps");
            }

            for url_entry in &urls {
                let Some(article_url) = url_entry.location() else {
                    continue;
                };
                let lastmod =
                    match resolve_lastmod(url_entry.modified(), self.now, self.local_offset) {
                        Ok(ts) => ts,
                        Err(e) => {
                            warn!(%article_url, error = %e, "Skipping sitemap url entry");
                            continue;
                        }
                    };
                if !self.config.in_window(lastmod) {
                    continue;
                }
                if !seen.insert(article_url.to_string()) {
                    continue;
                }

                sources.push(Source::new(article_url, lastmod));
                if sources.len() % 100 == 0 {
                    info!(articles = sources.len(), "Discovered articles");
                }
                if self.config.limit_reached(sources.len()) {
                    info!(articles = sources.len(), "Document limit reached");
                    self.limiter.end().await;
                    return Ok(sources);
                }
            }

            self.limiter.end().await;
        }

        info!(
            sitemaps = sitemap_count,
            articles = sources.len(),
            "Sitemap discovery finished"
        );
        Ok(sources)
    }

    async fn fetch_urlset(&self, url: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
        let body = self.fetcher.get_text(url).await?;
        parse_urlset(&body)
    }
}
