//! Persistence of parsed articles.
//!
//! The [`Persister`] maps [`ParsedScrap`] values to [`StoredDocument`]s and
//! hands the whole batch to a [`DocumentStore`] in one unordered bulk insert.
//! The store enforces uniqueness on `source`, which makes it the authority for
//! deduplication across runs: re-crawling a URL yields a duplicate-key write
//! failure that is counted and tolerated.
//!
//! # Submodules
//!
//! - [`mongo`]: MongoDB-backed [`DocumentStore`]

pub mod mongo;

use crate::error::PersistError;
use crate::models::{InsertReport, ParsedScrap};
use itertools::{Either, Itertools};
use mongodb::bson;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

/// Field carrying the uniqueness constraint.
pub const UNIQUE_FIELD: &str = "source";

/// Shape of a persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Article URL.
    pub source: String,
    #[serde(rename = "lastModified")]
    pub last_modified: bson::DateTime,
    /// Extracted text, `null` when extraction failed.
    pub value: Option<String>,
}

impl From<&ParsedScrap> for StoredDocument {
    fn from(parsed: &ParsedScrap) -> Self {
        Self {
            source: parsed.source.path.clone(),
            last_modified: bson::DateTime::from_millis(
                parsed.source.last_modified.timestamp_millis(),
            ),
            value: parsed.text.clone(),
        }
    }
}

/// Why a single document of a bulk insert was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// Another document with the same unique key already exists.
    DuplicateKey,
    Other(String),
}

/// A per-document failure reported by [`DocumentStore::insert_unordered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the document in the submitted batch.
    pub index: usize,
    pub kind: WriteFailureKind,
}

/// A collection supporting unique indexes and unordered bulk inserts.
pub trait DocumentStore {
    /// Create a unique index on `field` if it does not exist yet.
    async fn ensure_unique_index(&self, field: &str) -> Result<(), PersistError>;

    /// Insert every document that can be inserted.
    ///
    /// Returns the per-document failures; an empty vector means the whole
    /// batch was written. `Err` is reserved for failures of the call itself.
    async fn insert_unordered(
        &self,
        docs: Vec<StoredDocument>,
    ) -> Result<Vec<WriteFailure>, PersistError>;
}

/// Capability of writing a batch of parsed articles.
pub trait Saver {
    /// Persist a batch of parsed articles in one unordered bulk insert.
    ///
    /// # Arguments
    ///
    /// * `parsed` - Extraction results; records without text are stored with a `null` value
    ///
    /// # Returns
    ///
    /// An [`InsertReport`] counting new and duplicate documents, or an error
    /// when the store is unreachable or rejects a document for any reason
    /// other than a duplicate `source`.
    async fn save_parsed_scrap(&self, parsed: &[ParsedScrap]) -> Result<InsertReport, PersistError>;
}

/// Duplicate-tolerant [`Saver`] on top of any [`DocumentStore`].
#[derive(Debug)]
pub struct Persister<S> {
    store: S,
}

impl<S: DocumentStore> Persister<S> {
    /// Wrap `store`, making sure the uniqueness constraint exists.
    pub async fn new(store: S) -> Result<Self, PersistError> {
        store.ensure_unique_index(UNIQUE_FIELD).await?;
        Ok(Self { store })
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: DocumentStore> Saver for Persister<S> {
    #[instrument(level = "info", skip_all, fields(count = parsed.len()))]
    async fn save_parsed_scrap(&self, parsed: &[ParsedScrap]) -> Result<InsertReport, PersistError> {
        if parsed.is_empty() {
            info!("Nothing to persist");
            return Ok(InsertReport::default());
        }

        let documents: Vec<StoredDocument> = parsed.iter().map(StoredDocument::from).collect();
        let total = documents.len();
        let failures = self.store.insert_unordered(documents).await?;

        let (duplicates, others): (Vec<usize>, Vec<(usize, String)>) =
            failures.into_iter().partition_map(|f| match f.kind {
                WriteFailureKind::DuplicateKey => Either::Left(f.index),
                WriteFailureKind::Other(message) => Either::Right((f.index, message)),
            });

        let skipped = duplicates.len();
        let report = InsertReport {
            total,
            inserted: total - skipped,
            skipped,
        };
        if skipped > 0 {
            warn!(
                inserted = report.inserted,
                skipped, "Inserted batch, skipped duplicates"
            );
        } else if others.is_empty() {
            info!(inserted = report.inserted, "Inserted batch");
        }

        if let Some((index, message)) = others.first() {
            error!(
                failed = others.len(),
                first_index = index,
                first_error = %message,
                "Non-duplicate write errors"
            );
            return Err(PersistError::Write {
                count: others.len(),
                first: message.clone(),
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::testing::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn parsed(path: &str, text: Option<&str>) -> ParsedScrap {
        ParsedScrap {
            source: Source::new(path, Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap()),
            text: text.map(str::to_string),
        }
    }

    fn batch(range: std::ops::Range<usize>) -> Vec<ParsedScrap> {
        range
            .map(|i| parsed(&format!("https://example.com/{i}"), Some("text")))
            .collect()
    }

    #[test]
    fn test_document_mapping() {
        let doc = StoredDocument::from(&parsed("https://example.com/a", None));
        assert_eq!(doc.source, "https://example.com/a");
        assert_eq!(doc.value, None);
        assert_eq!(
            doc.last_modified.timestamp_millis(),
            Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap().timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_new_creates_unique_index() {
        let persister = Persister::new(MemoryStore::new()).await.unwrap();
        assert!(persister.store().is_unique("source"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let persister = Persister::new(MemoryStore::new()).await.unwrap();
        let report = persister.save_parsed_scrap(&[]).await.unwrap();
        assert_eq!(report, InsertReport::default());
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped_without_error() {
        let persister = Persister::new(MemoryStore::new()).await.unwrap();
        persister.save_parsed_scrap(&batch(0..3)).await.unwrap();

        // 10 documents, 3 of which were stored by the previous run.
        let report = persister.save_parsed_scrap(&batch(0..10)).await.unwrap();

        assert_eq!(
            report,
            InsertReport {
                total: 10,
                inserted: 7,
                skipped: 3
            }
        );
        assert_eq!(persister.store().documents().len(), 10);
    }

    #[tokio::test]
    async fn test_persisting_twice_is_idempotent() {
        let persister = Persister::new(MemoryStore::new()).await.unwrap();
        let docs = batch(0..5);

        persister.save_parsed_scrap(&docs).await.unwrap();
        let count_once = persister.store().documents().len();
        let second = persister.save_parsed_scrap(&docs).await.unwrap();

        assert_eq!(persister.store().documents().len(), count_once);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 5);
    }

    #[tokio::test]
    async fn test_failed_extraction_is_persisted_as_null() {
        let persister = Persister::new(MemoryStore::new()).await.unwrap();
        persister
            .save_parsed_scrap(&[parsed("https://example.com/x", None)])
            .await
            .unwrap();
        assert_eq!(persister.store().documents()[0].value, None);
    }

    #[tokio::test]
    async fn test_other_errors_fail_the_batch() {
        let store = MemoryStore::new().reject("https://example.com/2");
        let persister = Persister::new(store).await.unwrap();
        persister.save_parsed_scrap(&batch(0..1)).await.unwrap();

        let result = persister.save_parsed_scrap(&batch(0..4)).await;

        assert!(matches!(result, Err(PersistError::Write { count: 1, .. })));
        // Unordered insert still wrote the valid documents.
        assert_eq!(persister.store().documents().len(), 3);
    }
}
