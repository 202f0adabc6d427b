//! MongoDB-backed document store.
//!
//! Uses a single collection with a unique index on `source`. Bulk inserts are
//! unordered so one conflicting document does not stop the rest of the batch;
//! the driver reports every rejected document with its position and code.

use super::{DocumentStore, StoredDocument, WriteFailure, WriteFailureKind};
use crate::config::MongoSettings;
use crate::error::PersistError;
use crate::utils::redact_uri;
use mongodb::bson::Document;
use mongodb::error::{Error, ErrorKind};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info, instrument};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoStore {
    collection: Collection<StoredDocument>,
}

impl MongoStore {
    #[instrument(level = "info", skip_all, fields(db = %settings.db(), collection = %settings.collection()))]
    pub async fn connect(settings: &MongoSettings) -> Result<Self, PersistError> {
        let uri = settings.uri();
        let client = Client::with_uri_str(&uri).await?;
        let collection = client
            .database(settings.db())
            .collection::<StoredDocument>(settings.collection());
        info!(uri = %redact_uri(&uri), "Connected to MongoDB");
        Ok(Self { collection })
    }
}

impl DocumentStore for MongoStore {
    async fn ensure_unique_index(&self, field: &str) -> Result<(), PersistError> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        debug!(field, "Ensured unique index");
        Ok(())
    }

    async fn insert_unordered(
        &self,
        docs: Vec<StoredDocument>,
    ) -> Result<Vec<WriteFailure>, PersistError> {
        match self.collection.insert_many(docs).ordered(false).await {
            Ok(result) => {
                debug!(inserted = result.inserted_ids.len(), "Bulk insert complete");
                Ok(Vec::new())
            }
            Err(e) => match write_failures(&e) {
                Some(failures) => Ok(failures),
                None => Err(e.into()),
            },
        }
    }
}

/// Per-document failures of a partially applied bulk insert.
///
/// `None` when the error is not a plain set of write errors (network failure,
/// write concern failure) and must fail the whole call.
fn write_failures(e: &Error) -> Option<Vec<WriteFailure>> {
    let ErrorKind::InsertMany(failure) = e.kind.as_ref() else {
        return None;
    };
    if failure.write_concern_error.is_some() {
        return None;
    }
    let write_errors = failure.write_errors.as_ref()?;
    Some(
        write_errors
            .iter()
            .map(|w| WriteFailure {
                index: w.index,
                kind: failure_kind(w.code, &w.message),
            })
            .collect(),
    )
}

fn failure_kind(code: i32, message: &str) -> WriteFailureKind {
    if code == DUPLICATE_KEY_CODE {
        WriteFailureKind::DuplicateKey
    } else {
        WriteFailureKind::Other(format!("code {code}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind() {
        assert_eq!(
            failure_kind(11000, "E11000 duplicate key error"),
            WriteFailureKind::DuplicateKey
        );
        assert_eq!(
            failure_kind(121, "Document failed validation"),
            WriteFailureKind::Other("code 121: Document failed validation".to_string())
        );
    }
}
