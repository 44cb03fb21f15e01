use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use mongrate_db::{
    HistoryStore, LocalScriptDir, MigrationRecord, ScriptSource, eval_command,
    history_collection_name,
};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span};

use crate::error::{ErrorCode, MigrationError};
use crate::hash::compute_hash;

/// A script that has no history record yet, with the hash taken during
/// classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingScript {
    pub script_id: String,
    pub hash: String,
}

/// Outcome of classifying the script directory against the history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    /// Scripts to execute, in execution order.
    pub pending: Vec<PendingScript>,
    /// Recorded scripts whose hash still matches, in visit order.
    pub applied: Vec<String>,
}

/// A plan plus the text of each pending script, index for index.
struct Classified {
    plan: MigrationPlan,
    scripts: Vec<String>,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Scripts executed and recorded by this run, in execution order.
    pub applied: Vec<String>,
    /// Scripts that were already recorded and verified unchanged.
    pub skipped: Vec<String>,
}

/// Applies scripts from a [`ScriptSource`] to a [`HistoryStore`].
///
/// Scripts are visited in descending filename order. Each one is either
/// already recorded, in which case its hash must match the record, or it is
/// queued. Queued scripts are read as UTF-8 text while visiting, so an
/// unreadable script fails the run before anything executes. They then run
/// in that same descending order, and a history record is inserted after
/// each successful command. The first failure stops the run; records
/// inserted before it stay in place.
///
/// With `fail_on_order_mismatch` set, a recorded script visited after an
/// unrecorded one aborts the run before anything executes. Because the visit
/// is descending, this rejects any new script whose name sorts above an
/// applied one. The check is off unless enabled.
///
/// Nothing coordinates two runs against the same history collection. Both
/// may read the same history and execute the same pending script.
pub struct Migrator<'a> {
    source: &'a dyn ScriptSource,
    store: &'a dyn HistoryStore,
    fail_on_order_mismatch: bool,
    collection: String,
}

impl<'a> Migrator<'a> {
    pub fn new(source: &'a dyn ScriptSource, store: &'a dyn HistoryStore) -> Self {
        Self {
            source,
            store,
            fail_on_order_mismatch: false,
            collection: history_collection_name(None),
        }
    }

    pub fn fail_on_order_mismatch(mut self, strict: bool) -> Self {
        self.fail_on_order_mismatch = strict;
        self
    }

    /// Record history in `_migration_<suffix>` instead of `_migration`.
    pub fn collection_suffix(mut self, suffix: Option<&str>) -> Self {
        self.collection = history_collection_name(suffix);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Classify every script without executing anything.
    pub async fn plan(&self) -> Result<MigrationPlan, MigrationError> {
        let span = info_span!("plan", collection = %self.collection);
        self.classify()
            .instrument(span)
            .await
            .map(|classified| classified.plan)
    }

    /// Classify, then execute and record every pending script.
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        let span = info_span!("migrate", collection = %self.collection);
        async {
            let Classified { plan, scripts } = self.classify().await?;
            let mut report = MigrationReport {
                applied: Vec::with_capacity(plan.pending.len()),
                skipped: plan.applied,
            };
            for (pending, script) in plan.pending.into_iter().zip(scripts) {
                let record = self.apply(pending, &script).await?;
                report.applied.push(record.script_id);
            }
            info!(
                applied = report.applied.len(),
                skipped = report.skipped.len(),
                "migration finished"
            );
            Ok::<_, MigrationError>(report)
        }
        .instrument(span)
        .await
    }

    async fn classify(&self) -> Result<Classified, MigrationError> {
        let history = self.store.find_all(&self.collection).await.map_err(|e| {
            MigrationError::new(
                ErrorCode::DB_ACCESS | ErrorCode::DB_OPERATION,
                format!("Unable to read Database info. {e}"),
            )
        })?;

        let mut files = self.source.list_files().map_err(|e| {
            MigrationError::new(
                ErrorCode::FILE_ACCESS,
                format!("Unable to access scripts path. {e}"),
            )
        })?;
        files.sort_by(|a, b| b.cmp(a));

        let mut recorded: HashMap<&str, &MigrationRecord> = HashMap::with_capacity(history.len());
        for record in &history {
            recorded.entry(record.script_id.as_str()).or_insert(record);
        }

        let mut plan = MigrationPlan::default();
        let mut scripts = Vec::new();
        let mut found_non_migrated = false;

        for name in files {
            info!("checking script '{name}'");
            let hash = self.hash_script(&name)?;

            match recorded.get(name.as_str()) {
                Some(record) => {
                    if found_non_migrated && self.fail_on_order_mismatch {
                        return Err(MigrationError::new(
                            ErrorCode::ORDER_FAILED,
                            format!(
                                "Non-Migrated file found before '{name}' which has been migrated. \
                                 Order import failed, unable to proceed."
                            ),
                        ));
                    }
                    if record.hash != hash {
                        return Err(MigrationError::new(
                            ErrorCode::HASHING_FAILED,
                            format!("File '{name}' was previously migrated but hashes don't match."),
                        ));
                    }
                    info!("script '{name}' previously migrated, continuing");
                    plan.applied.push(name);
                }
                None => {
                    found_non_migrated = true;
                    scripts.push(self.read_script(&name)?);
                    plan.pending.push(PendingScript {
                        script_id: name,
                        hash,
                    });
                }
            }
        }

        Ok(Classified { plan, scripts })
    }

    fn hash_script(&self, name: &str) -> Result<String, MigrationError> {
        let hashing_failed = |cause: String| {
            MigrationError::new(
                ErrorCode::HASHING_FAILED | ErrorCode::FILE_ACCESS,
                format!("Error computing hash for file '{name}', aborting migration. {cause}"),
            )
        };
        let reader = self.source.open(name).map_err(|e| hashing_failed(e.to_string()))?;
        compute_hash(reader).map_err(|e| hashing_failed(e.to_string()))
    }

    fn read_script(&self, name: &str) -> Result<String, MigrationError> {
        self.source.read_to_string(name).map_err(|e| {
            MigrationError::new(
                ErrorCode::FILE_ACCESS,
                format!("Unable to read data file '{name}': {e}"),
            )
        })
    }

    async fn apply(
        &self,
        pending: PendingScript,
        script: &str,
    ) -> Result<MigrationRecord, MigrationError> {
        let PendingScript { script_id, hash } = pending;

        info!("running script '{script_id}'");
        let reply = self
            .store
            .run_command(eval_command(script))
            .await
            .map_err(|e| {
                MigrationError::new(
                    ErrorCode::DB_OPERATION,
                    format!("Unable to run command '{script_id}'. {e}"),
                )
            })?;
        debug!("script '{script_id}' replied: {reply}");

        let record = MigrationRecord::new(script_id, hash, Utc::now());
        self.store
            .insert(&self.collection, &record)
            .await
            .map_err(|e| {
                MigrationError::new(
                    ErrorCode::DB_ACCESS | ErrorCode::DB_OPERATION,
                    format!("Unable to save migration info for '{}'. {e}", record.script_id),
                )
            })?;
        Ok(record)
    }
}

/// Apply the scripts in `script_dir` to `store`, recording history in
/// `_migration` or `_migration_<collection_suffix>`.
pub async fn migrate(
    script_dir: impl AsRef<Path>,
    store: &dyn HistoryStore,
    fail_on_order_mismatch: bool,
    collection_suffix: Option<&str>,
) -> Result<(), MigrationError> {
    let source = LocalScriptDir::new(script_dir.as_ref());
    Migrator::new(&source, store)
        .fail_on_order_mismatch(fail_on_order_mismatch)
        .collection_suffix(collection_suffix)
        .run()
        .await
        .map(|_| ())
}
