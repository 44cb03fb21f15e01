use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongrate_common::{Error, Result};
use serde_json::{Value, json};
use tracing::debug;

use crate::record::MigrationRecord;
use crate::store::HistoryStore;

pub const OP_FIND: &str = "find";
pub const OP_INSERT: &str = "insert";
pub const OP_RUN_COMMAND: &str = "run_command";

/// In-process `HistoryStore` that records every call.
///
/// Each operation bumps a counter readable through [`MemoryStore::times`],
/// and any operation can be made to fail with [`MemoryStore::fail_on`] or
/// [`MemoryStore::fail_after`].
/// Commands are not interpreted; they are kept in submission order and
/// answered with `{"ok": 1}`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<MigrationRecord>>,
    commands: Vec<Value>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, Failure>,
}

struct Failure {
    /// Calls that still succeed before the failure kicks in.
    remaining: usize,
    message: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `collection` with existing history.
    pub fn with_records(self, collection: &str, records: Vec<MigrationRecord>) -> Self {
        self.state_mut()
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Make every later call to `op` fail with `message`.
    pub fn fail_on(&self, op: &'static str, message: impl Into<String>) {
        self.fail_after(op, 0, message);
    }

    /// Let `successes` more calls to `op` through, then fail every call after.
    pub fn fail_after(&self, op: &'static str, successes: usize, message: impl Into<String>) {
        self.state_mut().failures.insert(
            op,
            Failure {
                remaining: successes,
                message: message.into(),
            },
        );
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.state_mut().failures.remove(op);
    }

    /// Number of times `op` was invoked, failed calls included.
    pub fn times(&self, op: &str) -> usize {
        self.state_mut().calls.get(op).copied().unwrap_or(0)
    }

    /// Records of `collection` in insertion order.
    pub fn records(&self, collection: &str) -> Vec<MigrationRecord> {
        self.state_mut()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Commands submitted so far, oldest first.
    pub fn commands(&self) -> Vec<Value> {
        self.state_mut().commands.clone()
    }

    /// Setup and inspection helpers panic on a poisoned lock so a broken
    /// fixture cannot pass as an empty one.
    fn state_mut(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Database("memory store lock poisoned".into()))
    }
}

impl State {
    fn enter(&mut self, op: &'static str) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(op) {
            Some(failure) if failure.remaining > 0 => {
                failure.remaining -= 1;
                Ok(())
            }
            Some(failure) => Err(Error::Database(failure.message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<MigrationRecord>> {
        let mut state = self.lock()?;
        state.enter(OP_FIND)?;
        let mut records = state.collections.get(collection).cloned().unwrap_or_default();
        records.sort_by(|a, b| a.script_id.cmp(&b.script_id));
        Ok(records)
    }

    async fn insert(&self, collection: &str, record: &MigrationRecord) -> Result<()> {
        let mut state = self.lock()?;
        state.enter(OP_INSERT)?;
        debug!("memory store: insert {} into {collection}", record.script_id);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn run_command(&self, command: Value) -> Result<Value> {
        let mut state = self.lock()?;
        state.enter(OP_RUN_COMMAND)?;
        state.commands.push(command);
        Ok(json!({ "ok": 1 }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::eval_command;

    fn record(id: &str) -> MigrationRecord {
        MigrationRecord::new(id, "00", Utc::now())
    }

    #[tokio::test]
    async fn find_all_sorts_by_script_id() {
        let store = MemoryStore::new().with_records(
            "_migration",
            vec![record("003.js"), record("001.js"), record("002.js")],
        );

        let ids: Vec<_> = store
            .find_all("_migration")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.script_id)
            .collect();
        assert_eq!(ids, vec!["001.js", "002.js", "003.js"]);
        assert_eq!(store.times(OP_FIND), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        store.insert("_migration_a", &record("x.js")).await.unwrap();

        assert!(store.find_all("_migration").await.unwrap().is_empty());
        assert_eq!(store.find_all("_migration_a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_counts_the_call() {
        let store = MemoryStore::new();
        store.fail_on(OP_INSERT, "some error");

        let err = store.insert("_migration", &record("a.js")).await.unwrap_err();
        assert_eq!(err.to_string(), "database error: some error");
        assert_eq!(store.times(OP_INSERT), 1);
        assert!(store.records("_migration").is_empty());

        store.clear_failure(OP_INSERT);
        store.insert("_migration", &record("a.js")).await.unwrap();
        assert_eq!(store.records("_migration").len(), 1);
    }

    #[tokio::test]
    async fn fail_after_lets_leading_calls_through() {
        let store = MemoryStore::new();
        store.fail_after(OP_RUN_COMMAND, 1, "boom");

        assert!(store.run_command(eval_command("one")).await.is_ok());
        assert!(store.run_command(eval_command("two")).await.is_err());
        assert!(store.run_command(eval_command("three")).await.is_err());
        assert_eq!(store.commands().len(), 1);
        assert_eq!(store.times(OP_RUN_COMMAND), 3);
    }

    #[tokio::test]
    async fn run_command_keeps_submission_order() {
        let store = MemoryStore::new();
        let reply = store.run_command(eval_command("first")).await.unwrap();
        store.run_command(eval_command("second")).await.unwrap();

        assert_eq!(reply["ok"], 1);
        let commands = store.commands();
        assert_eq!(commands[0]["eval"], "first");
        assert_eq!(commands[1]["eval"], "second");
        assert_eq!(store.times(OP_RUN_COMMAND), 2);
    }

    #[test]
    #[should_panic(expected = "memory store lock poisoned")]
    fn setup_on_poisoned_store_panics() {
        let store = MemoryStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.state.lock().unwrap();
            panic!("fixture thread died");
        }));

        store.fail_on(OP_INSERT, "never installed");
    }

    #[tokio::test]
    async fn poisoned_store_operations_report_database_error() {
        let store = MemoryStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.state.lock().unwrap();
            panic!("fixture thread died");
        }));

        let err = store.find_all("_migration").await.unwrap_err();
        assert_eq!(err.to_string(), "database error: memory store lock poisoned");
    }
}
