//! Command-line interface definitions.
//!
//! Arguments can be given as flags; the configuration path can also come from
//! the `SCRAPER_CONFIG` environment variable.

use crate::scrapers::SiteKind;
use clap::Parser;

/// Command-line arguments for the sitemap news scraper.
///
/// # Examples
///
/// ```sh
/// # Crawl every site configured in ./scraper.yml
/// sitemap_news_scraper
///
/// # Crawl only Habr, with an explicit config file
/// sitemap_news_scraper -c /etc/scraper.yml -s habr
///
/// # Crawl both sites in a fixed order
/// sitemap_news_scraper -s rbc -s habr
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "SCRAPER_CONFIG", default_value = "scraper.yml")]
    pub config: String,

    /// Site to crawl; repeat to crawl several. Defaults to every configured site
    #[arg(short, long, value_enum)]
    pub site: Vec<SiteKind>,
}
