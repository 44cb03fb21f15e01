use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied script, as persisted in the history collection.
///
/// Records are written once after the script's command succeeds and are
/// never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// The script's filename.
    pub script_id: String,
    /// Lowercase hex MD5 of the script bytes at the time it ran.
    pub hash: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl MigrationRecord {
    pub fn new(
        script_id: impl Into<String>,
        hash: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            script_id: script_id.into(),
            hash: hash.into(),
            timestamp,
        }
    }
}
