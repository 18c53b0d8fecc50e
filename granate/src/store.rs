//! The store contract between the migration engine and a live database.
//!
//! A [`MigrationStore`] is an already-open connection; the engine never parses
//! or constructs connection strings. The engine only ever asks a store to run
//! an opaque script, read the two migration tables, or (for fake-forward)
//! insert a state row directly. Everything else, including transactional
//! boundaries and the ledger inserts and deletes, lives inside the migration
//! scripts themselves.

use crate::error::Error;
use crate::migration::{MigrationLogRecord, MigrationRecord};

/// Name of the table holding the stack of currently-applied migrations.
pub const STATE_TABLE: &str = "migration_state";

/// Name of the append-only audit table fed by triggers on [`STATE_TABLE`].
pub const LOG_TABLE: &str = "migration_log";

/// An open database handle the engine can run migrations against.
pub trait MigrationStore {
    /// Execute one migration statement. The statement manages its own
    /// transaction; a failure here may leave the connection in an
    /// aborted-transaction status that the implementation must clear before
    /// subsequent reads succeed.
    fn run_script(&mut self, sql: &str) -> Result<(), Error>;

    /// Read the applied-migration stack in ascending name order. A missing
    /// state table reads as an empty state, not an error.
    fn read_state(&mut self) -> Result<Vec<MigrationRecord>, Error>;

    /// Read the audit log in insertion order. A missing log table reads as an
    /// empty log, not an error.
    fn read_log(&mut self) -> Result<Vec<MigrationLogRecord>, Error>;

    /// Insert a state row for `name` without running any script. Used to adopt
    /// pre-existing schema state ("fake" migrations).
    fn record_applied(&mut self, name: &str) -> Result<(), Error>;
}
