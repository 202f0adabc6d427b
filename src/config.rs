//! YAML configuration for crawl jobs.
//!
//! ```yaml
//! sites:
//!   habr:
//!     crawl_delay: 1.5
//!     get_from: 2023-06-01T00:00:00+03:00
//!     get_to: 2023-12-31T23:59:59+03:00
//!     doc_limit: 500
//!   rbc:
//!     crawl_delay: 1
//!     get_from: 2023-06-01
//!     get_to: 2023-12-31
//!     discovery:
//!       type: category
//!       category: Invest
//! mongo_settings:
//!   address: localhost:27017
//!   user: scraper
//!   password: secret
//!   db: news
//!   collection: articles
//! ```
//!
//! Optional keys that are missing are reported at warn level and replaced by
//! their defaults.

use crate::error::ConfigError;
use crate::models::SiteConfig;
use crate::scrapers::rbc::RbcCategory;
use crate::sitemap::parse_timestamp;
use crate::utils::redact_uri;
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_ADDRESS: &str = "localhost:27017";
pub const DEFAULT_DB: &str = "scrapper_default";
pub const DEFAULT_COLLECTION: &str = "scrapper_default";
/// Offset applied to timestamps that carry none (Moscow time).
pub const DEFAULT_UTC_OFFSET: &str = "+03:00";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sites: BTreeMap<String, SiteSettings>,
    #[serde(default)]
    pub mongo_settings: MongoSettings,
}

/// How a site finds candidate articles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discovery {
    /// Walk the site's sitemap index.
    #[default]
    Sitemap,
    /// Read the latest links from a category page.
    Category {
        #[serde(default)]
        category: RbcCategory,
    },
}

/// Raw per-site settings as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    /// Seconds between the starts of two requests.
    pub crawl_delay: f64,
    pub get_from: String,
    pub get_to: String,
    #[serde(default)]
    pub doc_limit: Option<usize>,
    #[serde(default)]
    pub utc_offset: Option<String>,
    #[serde(default)]
    pub discovery: Discovery,
}

impl SiteSettings {
    /// Offset used for timestamps without one.
    pub fn local_offset(&self) -> Result<FixedOffset, ConfigError> {
        let raw = self.utc_offset.as_deref().unwrap_or(DEFAULT_UTC_OFFSET);
        raw.parse::<FixedOffset>()
            .map_err(|e| ConfigError::Invalid(format!("utc_offset {raw:?}: {e}")))
    }

    /// Validate and convert into the pipeline's [`SiteConfig`].
    pub fn site_config(&self) -> Result<SiteConfig, ConfigError> {
        if !self.crawl_delay.is_finite() || self.crawl_delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "crawl_delay must be a non-negative number of seconds, got {}",
                self.crawl_delay
            )));
        }

        let offset = self.local_offset()?;
        let window_start = parse_timestamp(&self.get_from, offset)
            .map_err(|e| ConfigError::Invalid(format!("get_from: {e}")))?;
        let window_end = parse_timestamp(&self.get_to, offset)
            .map_err(|e| ConfigError::Invalid(format!("get_to: {e}")))?;
        if window_start > window_end {
            return Err(ConfigError::Invalid(format!(
                "get_from ({window_start}) is after get_to ({window_end})"
            )));
        }

        let doc_limit = match self.doc_limit {
            Some(0) => {
                warn!("doc_limit of 0 means unlimited");
                None
            }
            limit => limit,
        };

        Ok(SiteConfig {
            crawl_delay: Duration::from_secs_f64(self.crawl_delay),
            window_start,
            window_end,
            doc_limit,
        })
    }
}

/// Connection settings for the document store.
#[derive(Clone, Default, Deserialize)]
pub struct MongoSettings {
    pub address: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub db: Option<String>,
    pub collection: Option<String>,
}

impl MongoSettings {
    /// Connection string built from address and optional credentials.
    pub fn uri(&self) -> String {
        let address = self.address.as_deref().unwrap_or(DEFAULT_ADDRESS);
        match (&self.user, &self.password) {
            (None, None) => format!("mongodb://{address}"),
            (Some(user), None) => format!("mongodb://{user}@{address}"),
            (user, Some(password)) => format!(
                "mongodb://{}:{password}@{address}",
                user.as_deref().unwrap_or_default()
            ),
        }
    }

    pub fn db(&self) -> &str {
        self.db.as_deref().unwrap_or(DEFAULT_DB)
    }

    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(DEFAULT_COLLECTION)
    }

    fn warn_missing(&self) {
        let keys = [
            ("address", self.address.is_none()),
            ("user", self.user.is_none()),
            ("password", self.password.is_none()),
            ("db", self.db.is_none()),
            ("collection", self.collection.is_none()),
        ];
        for (key, missing) in keys {
            if missing {
                warn!(key, "mongo_settings has no value; using default");
            }
        }
    }
}

impl fmt::Debug for MongoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoSettings")
            .field("uri", &redact_uri(&self.uri()))
            .field("db", &self.db())
            .field("collection", &self.collection())
            .finish()
    }
}

impl Config {
    /// Read and parse a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse configuration text. Site names are matched case-insensitively
    /// and stored lowercase.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        let mut sites = BTreeMap::new();
        for (name, site) in std::mem::take(&mut config.sites) {
            let key = name.to_ascii_lowercase();
            if sites.insert(key, site).is_some() {
                warn!(site = %name, "Site configured more than once; keeping the last entry");
            }
        }
        config.sites = sites;
        if config.sites.is_empty() {
            warn!("config has no sites");
        }
        for (name, site) in &config.sites {
            if site.doc_limit.is_none() {
                warn!(site = %name, key = "doc_limit", "config has no value; crawling without limit");
            }
        }
        config.mongo_settings.warn_missing();
        debug!(?config, "Loaded config");
        Ok(config)
    }

    pub fn site(&self, name: &str) -> Result<&SiteSettings, ConfigError> {
        self.sites
            .get(name)
            .ok_or_else(|| ConfigError::Invalid(format!("no settings for site {name:?}")))
    }
}
