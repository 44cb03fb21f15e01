//! Applies a directory of server-side scripts to a document database
//! exactly once each.
//!
//! Every script that runs is recorded in a history collection together with
//! the MD5 of its bytes. Later runs verify that recorded scripts are
//! unchanged and, in strict mode, that none of them sorts below a script
//! that has not run yet.

pub mod engine;
pub mod error;
pub mod hash;

pub use engine::{MigrationPlan, MigrationReport, Migrator, PendingScript, migrate};
pub use error::{ErrorCode, MigrationError};
pub use hash::compute_hash;
pub use mongrate_db::{MigrationRecord, history_collection_name};
