//! HTML to plain-text extraction.
//!
//! An [`ExtractionProfile`] describes where a site keeps its article body:
//! an ordered list of container selectors (first match wins) and the block
//! elements whose text makes up the body. The extracted text has the form
//! `"<title> - <body>"`, where the title is the first `h1` of the page.

use super::stats::ParsedStats;
use super::Parser;
use crate::error::ExtractError;
use crate::models::{ParsedScrap, Scrap};
use crate::utils::normalize_text;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Title used when a page has no usable `h1`.
pub const NO_TITLE: &str = "No title";

/// Site-specific extraction rules.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionProfile {
    pub site: &'static str,
    /// Container selectors in order of preference.
    pub containers: &'static [&'static str],
    /// Tags of the block elements collected inside the container.
    pub blocks: &'static [&'static str],
}

#[derive(Debug)]
pub struct ContentExtractor {
    site: &'static str,
    containers: Vec<Selector>,
    blocks: Selector,
    title: Selector,
}

fn selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|e| ExtractError::Selector {
        selector: raw.to_string(),
        reason: format!("{e:?}"),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(" "))
}

impl ContentExtractor {
    pub fn new(profile: &ExtractionProfile) -> Result<Self, ExtractError> {
        let containers = profile
            .containers
            .iter()
            .map(|raw| selector(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            site: profile.site,
            containers,
            blocks: selector(&profile.blocks.join(", "))?,
            title: selector("h1")?,
        })
    }

    /// Extract `"<title> - <body>"` from one page.
    pub fn extract(&self, html: &str) -> Result<String, ExtractError> {
        let document = Html::parse_document(html);

        let container = self
            .containers
            .iter()
            .find_map(|sel| document.select(sel).next())
            .ok_or(ExtractError::MissingContainer)?;

        let title = document
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let body = container
            .select(&self.blocks)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(format!("{title} - {body}"))
    }
}

impl Parser for ContentExtractor {
    #[instrument(level = "info", skip_all, fields(site = self.site, count = scrap.len()))]
    fn parse_scrap(&self, scrap: Vec<Scrap>) -> Vec<ParsedScrap> {
        let total = scrap.len();
        let mut failed = 0usize;

        let mut parsed = Vec::with_capacity(total);
        for (i, item) in scrap.into_iter().enumerate() {
            let text = match self.extract(&item.raw_content) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(url = %item.source.path, error = %e, "Failed to parse article");
                    failed += 1;
                    None
                }
            };
            parsed.push(ParsedScrap {
                source: item.source,
                text,
            });

            if (i + 1) % 100 == 0 {
                info!(parsed = i + 1, total, "Parse progress");
            }
        }

        let ratio = if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        };
        if failed > 0 {
            warn!(failed, total, ratio, "Failed to parse some articles");
        } else {
            info!(failed, total, ratio, "Parsed all articles");
        }
        parsed
    }

    fn info_scrap(&self, scrap: &[Scrap]) -> usize {
        info!(site = self.site, articles = scrap.len(), "Scrap batch size");
        scrap.len()
    }

    fn info_parsed_scrap(&self, parsed: &[ParsedScrap]) -> Option<ParsedStats> {
        let Some(stats) = ParsedStats::compute(parsed) else {
            warn!(site = self.site, "Parsed zero articles");
            return None;
        };
        info!(
            site = self.site,
            articles = stats.total,
            with_text = stats.with_text,
            avg_letters = stats.avg_chars,
            avg_words = stats.avg_words,
            "Parsed scrap statistics"
        );
        if let Some(needed) = stats.docs_for_target {
            info!(site = self.site, needed, "Documents needed to reach corpus target");
        }
        Some(stats)
    }
}
