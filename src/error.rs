//! Error types for each pipeline stage.
//!
//! Per-item failures (a bad sub-sitemap, a 404 article, a page without a
//! content container, a duplicate key) are recovered inside their stage and
//! only counted. The errors that escape a stage are the ones that end a run:
//! an unreadable sitemap index, an unreachable store, or a non-duplicate
//! write error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
}

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed sitemap XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("malformed lastmod timestamp: {0:?}")]
    Timestamp(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("could not find article content container")]
    MissingContainer,
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("{count} non-duplicate write error(s), first: {first}")]
    Write { count: usize, first: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Profile(#[from] ExtractError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] SitemapError),

    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
}
