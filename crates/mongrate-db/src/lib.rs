pub mod memory;
pub mod mongo;
pub mod record;
pub mod source;
pub mod store;

pub use memory::{MemoryStore, OP_FIND, OP_INSERT, OP_RUN_COMMAND};
pub use mongo::MongoStore;
pub use record::MigrationRecord;
pub use source::{LocalScriptDir, ScriptSource};
pub use store::{HistoryStore, MIGRATION_COLLECTION, eval_command, history_collection_name};
