use async_trait::async_trait;
use mongrate_common::Result;
use serde_json::{Value, json};

use crate::record::MigrationRecord;

/// Base name of the history collection.
pub const MIGRATION_COLLECTION: &str = "_migration";

/// Resolve the history collection name: `_migration`, or
/// `_migration_<suffix>` when a non-empty suffix is given.
pub fn history_collection_name(suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) if !suffix.is_empty() => format!("{MIGRATION_COLLECTION}_{suffix}"),
        _ => MIGRATION_COLLECTION.to_string(),
    }
}

/// Build the server-side evaluation command for a script body.
pub fn eval_command(script: &str) -> Value {
    json!({ "eval": script })
}

/// The database capabilities the migration engine consumes.
///
/// Implementations perform each call as a single round trip; the engine
/// never issues two calls concurrently.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All records in `collection`, sorted by `script_id` ascending.
    async fn find_all(&self, collection: &str) -> Result<Vec<MigrationRecord>>;

    async fn insert(&self, collection: &str, record: &MigrationRecord) -> Result<()>;

    /// Run a database command and return the server's reply document.
    async fn run_command(&self, command: Value) -> Result<Value>;
}
