//! In-memory doubles for the network, the clock and the document store.

use crate::error::{FetchError, PersistError};
use crate::http::PageFetcher;
use crate::rate_limiter::Clock;
use crate::savers::{DocumentStore, StoredDocument, WriteFailure, WriteFailureKind};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock whose `sleep` advances virtual time instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate time passing inside an operation.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Serves canned pages by URL and records every request.
///
/// Unknown URLs answer with a 404 status error.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<String, u16>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|u| u == url)
    }
}

impl PageFetcher for StaticFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Document store that enforces uniqueness on `source` once indexed.
///
/// Sources listed through [`MemoryStore::reject`] fail with a non-duplicate
/// write error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<StoredDocument>>,
    unique_fields: Mutex<HashSet<String>>,
    rejected: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, source: &str) -> Self {
        self.rejected.insert(source.to_string());
        self
    }

    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents.lock().unwrap().clone()
    }

    pub fn is_unique(&self, field: &str) -> bool {
        self.unique_fields.lock().unwrap().contains(field)
    }
}

impl DocumentStore for MemoryStore {
    async fn ensure_unique_index(&self, field: &str) -> Result<(), PersistError> {
        self.unique_fields.lock().unwrap().insert(field.to_string());
        Ok(())
    }

    async fn insert_unordered(
        &self,
        docs: Vec<StoredDocument>,
    ) -> Result<Vec<WriteFailure>, PersistError> {
        let unique = self.is_unique("source");
        let mut stored = self.documents.lock().unwrap();
        let mut failures = Vec::new();

        for (index, doc) in docs.into_iter().enumerate() {
            if self.rejected.contains(&doc.source) {
                failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::Other("document failed validation".to_string()),
                });
                continue;
            }
            if unique && stored.iter().any(|d| d.source == doc.source) {
                failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::DuplicateKey,
                });
                continue;
            }
            stored.push(doc);
        }

        Ok(failures)
    }
}
