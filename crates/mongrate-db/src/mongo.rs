use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use mongrate_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::record::MigrationRecord;
use crate::store::HistoryStore;

/// `HistoryStore` backed by a MongoDB database through the official driver.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

/// Wire shape of a history document. The timestamp is stored as a native
/// BSON date so it sorts and queries like one in the shell.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    script_id: String,
    hash: String,
    #[serde(default)]
    timestamp: Option<bson::DateTime>,
}

impl From<&MigrationRecord> for HistoryDocument {
    fn from(record: &MigrationRecord) -> Self {
        Self {
            script_id: record.script_id.clone(),
            hash: record.hash.clone(),
            timestamp: Some(bson::DateTime::from_millis(
                record.timestamp.timestamp_millis(),
            )),
        }
    }
}

impl From<HistoryDocument> for MigrationRecord {
    fn from(doc: HistoryDocument) -> Self {
        let timestamp = doc
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()))
            .unwrap_or_default();
        MigrationRecord::new(doc.script_id, doc.hash, timestamp)
    }
}

impl MongoStore {
    /// Wrap an already-connected database handle.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Build a client from a connection string and select `database`.
    ///
    /// The driver connects lazily; the first operation surfaces any
    /// connectivity error.
    pub async fn connect(uri: &str, database: &str, app_name: Option<&str>) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| Error::Database(format!("invalid connection string: {e}")))?;
        if let Some(app_name) = app_name {
            options.app_name = Some(app_name.to_string());
        }
        let client = Client::with_options(options)
            .map_err(|e| Error::Database(format!("failed to create client: {e}")))?;
        info!("using database '{database}'");
        Ok(Self::new(client.database(database)))
    }
}

#[async_trait]
impl HistoryStore for MongoStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<MigrationRecord>> {
        let cursor = self
            .db
            .collection::<HistoryDocument>(collection)
            .find(doc! {})
            .sort(doc! { "script_id": 1 })
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        let docs: Vec<HistoryDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(docs.into_iter().map(MigrationRecord::from).collect())
    }

    async fn insert(&self, collection: &str, record: &MigrationRecord) -> Result<()> {
        self.db
            .collection::<HistoryDocument>(collection)
            .insert_one(HistoryDocument::from(record))
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn run_command(&self, command: Value) -> Result<Value> {
        let command = json_to_document(&command)?;
        let reply = self
            .db
            .run_command(command)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(Bson::Document(reply).into_relaxed_extjson())
    }
}

fn json_to_document(value: &Value) -> Result<Document> {
    bson::to_document(value)
        .map_err(|e| Error::Database(format!("command is not a document: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::eval_command;

    #[test]
    fn history_document_round_trips_millisecond_timestamps() {
        let ts = DateTime::<Utc>::from_timestamp_millis(1_709_294_400_123).unwrap();
        let record = MigrationRecord::new("001_init.js", "abcd", ts);

        let doc = HistoryDocument::from(&record);
        assert_eq!(doc.timestamp.unwrap().timestamp_millis(), 1_709_294_400_123);

        let back = MigrationRecord::from(doc);
        assert_eq!(back, record);
    }

    #[test]
    fn history_document_without_timestamp_reads_as_epoch() {
        let raw = doc! { "script_id": "script_001.js", "hash": "1234" };
        let parsed: HistoryDocument = bson::from_document(raw).unwrap();
        let record = MigrationRecord::from(parsed);
        assert_eq!(record.script_id, "script_001.js");
        assert_eq!(record.timestamp, DateTime::<Utc>::default());
    }

    #[test]
    fn eval_command_converts_to_bson() {
        let doc = json_to_document(&eval_command("db.a.drop()")).unwrap();
        assert_eq!(doc.get_str("eval").unwrap(), "db.a.drop()");
    }

    #[test]
    fn non_object_command_is_rejected() {
        let err = json_to_document(&json!("ping")).unwrap_err();
        assert!(err.to_string().starts_with("database error: command is not a document"));
    }
}
