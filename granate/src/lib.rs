#![cfg_attr(docsrs, feature(doc_cfg))]
//! `granate` runs ordered, scripted SQL migrations and guarantees that the set
//! of migrations recorded as applied never silently diverges from the set
//! defined in source.
//!
//! # Core concepts
//!
//! - The **catalog** is the complete, ordered, immutable list of
//!   [Migration]s your project defines, loaded from a directory of `.sql`
//!   files ([files::read_migration_files]) or from a module generated at
//!   build time ([embed]).
//! - The **state** is the stack of currently-applied migration names, stored
//!   in the database's `migration_state` table. Forward scripts insert their
//!   own row and backward scripts delete it, inside the same transaction as
//!   the schema change, so the ledger can never disagree with what actually
//!   committed.
//! - The **log** is an append-only audit trail (`migration_log`), fed by a
//!   trigger the initial migration installs; `granate` only ever reads it.
//!
//! Before anything runs, the [Migrator] reconciles state against catalog and
//! computes the exact ordered batch needed to reach the requested target, or
//! a structured [Error] explaining why it cannot. Any disagreement between
//! state and catalog is reported, never silently resolved. Batches execute
//! strictly sequentially and halt on the first failure, leaving the
//! already-run prefix committed.
//!
//! # Example
//!
//! ```ignore
//! use granate::{files, Migrator};
//! use granate::postgres::{NoTls, PostgresClient};
//!
//! let catalog = files::read_migration_files("migrations".as_ref())?;
//! let migrator = Migrator::try_new(catalog)?;
//! let mut client = PostgresClient::connect("postgres://localhost/app", NoTls)?;
//!
//! // Approve unconditionally; a CLI would prompt here instead.
//! let ran = migrator.forward(&mut client, |_batch, _direction| true)?;
//! # Ok::<(), granate::Error>(())
//! ```
//!
//! # Database support
//!
//! - PostgreSQL via the [postgres] module - `postgres` feature flag.
//! - SQLite via the [sqlite] module - `sqlite` feature flag.
//!
//! Tracing integration is available with the `tracing` feature flag, and
//! catalog-building test helpers with the `testing` feature flag.

mod error;
pub use error::Error;

mod migration;
pub use migration::{Direction, LogOp, Migration, MigrationLogRecord, MigrationRecord};

pub mod plan;

mod runner;
pub use runner::Migrator;

pub mod store;

pub mod embed;
pub mod files;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
