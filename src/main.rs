//! # Sitemap News Scraper
//!
//! A polite crawler that builds a plain-text corpus of news articles. For each
//! configured site it discovers article URLs from the site's sitemap index (or
//! an RBC category page), downloads every page at a fixed rate, extracts the
//! article text and stores it in MongoDB.
//!
//! ## Features
//!
//! - Scrapes Habr and RBC, selected from the command line or configuration
//! - Honors a per-site crawl delay between consecutive requests
//! - Filters articles by a modification-time window and an optional cap
//! - Stores one document per URL; re-crawls skip already stored articles
//!
//! ## Usage
//!
//! ```sh
//! sitemap_news_scraper -c scraper.yml -s habr
//! ```
//!
//! ## Architecture
//!
//! Each site runs the same pipeline, one site after another:
//! 1. **Discovery**: Walk the sitemap index and collect in-window article URLs
//! 2. **Fetching**: Download every article page, one request at a time
//! 3. **Extraction**: Reduce each page to `"<title> - <body>"`
//! 4. **Persistence**: Bulk insert into MongoDB, tolerating duplicates

use clap::Parser;
use std::error::Error;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod http;
mod models;
mod pipeline;
mod rate_limiter;
mod savers;
mod scrapers;
mod sitemap;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::Config;
use http::HttpClient;
use savers::mongo::MongoStore;
use savers::Persister;
use scrapers::SiteKind;

/// Sites to crawl: those named on the command line, or every configured one.
fn selected_sites(cli_sites: &[SiteKind], config: &Config) -> Vec<SiteKind> {
    if !cli_sites.is_empty() {
        return cli_sites.to_vec();
    }
    config
        .sites
        .keys()
        .filter_map(|name| match name.parse::<SiteKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                warn!(site = %name, known = ?SiteKind::ALL, "Unknown site in config; ignoring");
                None
            }
        })
        .collect()
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sitemap_news_scraper starting up");

    let args = Cli::parse();
    let config = Config::load(&args.config).inspect_err(|e| {
        error!(path = %args.config, error = %e, "Failed to load configuration");
    })?;

    let sites = selected_sites(&args.site, &config);
    if sites.is_empty() {
        warn!("No sites to crawl");
        return Ok(());
    }
    info!(?sites, "Selected sites");

    let store = MongoStore::connect(&config.mongo_settings).await?;
    let saver = Persister::new(store).await?;
    let http = HttpClient::new()?;

    let mut summaries = Vec::with_capacity(sites.len());
    for kind in sites {
        let settings = config.site(kind.as_str())?;
        let (getter, parser) = kind.build(http.clone(), settings)?;
        let summary = pipeline::run(kind.as_str(), &getter, &parser, &saver).await?;
        summaries.push(summary);
    }

    let inserted: usize = summaries.iter().map(|s| s.insert.inserted).sum();
    let skipped: usize = summaries.iter().map(|s| s.insert.skipped).sum();
    let elapsed = start_time.elapsed();
    info!(
        sites = summaries.len(),
        inserted,
        skipped,
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
sites:
  rbc:
    crawl_delay: 1
    get_from: 2023-06-01
    get_to: 2023-12-31
  lenta:
    crawl_delay: 1
    get_from: 2023-06-01
    get_to: 2023-12-31
  Habr:
    crawl_delay: 1
    get_from: 2023-06-01
    get_to: 2023-12-31
"#;

    #[test]
    fn test_selected_sites_from_config_skips_unknown() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        assert_eq!(
            selected_sites(&[], &config),
            vec![SiteKind::Habr, SiteKind::Rbc]
        );
    }

    #[test]
    fn test_selected_sites_resolve_to_settings() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        for kind in selected_sites(&[], &config) {
            assert!(config.site(kind.as_str()).is_ok(), "{kind} has no settings");
        }
    }

    #[test]
    fn test_selected_sites_prefers_cli() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        assert_eq!(selected_sites(&[SiteKind::Rbc], &config), vec![SiteKind::Rbc]);
    }
}
