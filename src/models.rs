//! Data models flowing through the scraping pipeline.
//!
//! This module defines the values each stage hands to the next:
//! - [`Source`]: An article reference discovered from a sitemap or category page
//! - [`Scrap`]: Raw fetched content for a [`Source`]
//! - [`ParsedScrap`]: Extracted plain text for a [`Source`], or an explicit absence
//! - [`SiteConfig`]: Per-site crawl parameters supplied by the configuration
//! - [`InsertReport`] and [`RunSummary`]: Outcome reporting for a site run

use chrono::{DateTime, Utc};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// An addressable article reference plus its last-known modification time.
///
/// Identity is the `path` alone: two sources with the same URL are the same
/// logical source even when observed with different `last_modified` values.
/// `PartialEq` and `Hash` are implemented on `path` so sets and maps keyed by
/// `Source` deduplicate by URL.
#[derive(Debug, Clone)]
pub struct Source {
    /// The article URL.
    pub path: String,
    /// Modification time advertised by the site (or discovery time when absent).
    pub last_modified: DateTime<Utc>,
}

impl Source {
    pub fn new(path: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --- {}", self.path, self.last_modified.to_rfc3339())
    }
}

/// Raw content fetched for one [`Source`].
#[derive(Debug, Clone)]
pub struct Scrap {
    pub source: Source,
    /// Response body as returned by the site.
    pub raw_content: String,
}

/// Plain-text extraction result for one [`Source`].
///
/// `text` is `None` when extraction failed; the record is still persisted so
/// the store remembers the URL was visited.
#[derive(Debug, Clone)]
pub struct ParsedScrap {
    pub source: Source,
    pub text: Option<String>,
}

/// Crawl parameters for a single site.
///
/// Read-only for the lifetime of a pipeline run.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Minimum gap between the starts of two network calls to the site.
    pub crawl_delay: Duration,
    /// Inclusive lower bound on accepted `lastmod` values.
    pub window_start: DateTime<Utc>,
    /// Inclusive upper bound on accepted `lastmod` values.
    pub window_end: DateTime<Utc>,
    /// Stop discovery once this many sources were accepted. `None` is unlimited.
    pub doc_limit: Option<usize>,
}

impl SiteConfig {
    /// Whether a timestamp falls inside the inclusive crawl window.
    pub fn in_window(&self, ts: DateTime<Utc>) -> bool {
        self.window_start <= ts && ts <= self.window_end
    }

    /// Whether `count` accepted sources satisfies the document limit.
    pub fn limit_reached(&self, count: usize) -> bool {
        matches!(self.doc_limit, Some(limit) if count >= limit)
    }
}

/// Outcome of a successful bulk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertReport {
    /// Documents submitted in the batch.
    pub total: usize,
    /// Documents newly written.
    pub inserted: usize,
    /// Documents rejected because their `source` already existed.
    pub skipped: usize,
}

/// Counts collected over one site's pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub site: String,
    pub discovered: usize,
    pub fetched: usize,
    pub parsed: usize,
    pub failed: usize,
    pub insert: InsertReport,
}
