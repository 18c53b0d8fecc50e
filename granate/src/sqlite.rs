//! SQLite store backend, using the [`rusqlite`](https://crates.io/crates/rusqlite)
//! crate.
//!
//! Useful for embedded applications and for exercising migration catalogs
//! against an in-memory database. Timestamps are stored as text; both RFC 3339
//! and SQLite's plain `datetime('now')` format are accepted when reading.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Error;
use crate::migration::{LogOp, MigrationLogRecord, MigrationRecord};
use crate::store::{MigrationStore, LOG_TABLE, STATE_TABLE};

// Re-export the connection type so callers don't need a direct dependency on
// the driver crate.
pub use rusqlite::Connection as SqliteConnection;

fn table_exists(conn: &rusqlite::Connection, table: &str) -> Result<bool, Error> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let exists = stmt.query([table])?.next()?.is_some();
    Ok(exists)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")?;
    Ok(naive.and_utc())
}

impl MigrationStore for rusqlite::Connection {
    fn run_script(&mut self, sql: &str) -> Result<(), Error> {
        if let Err(err) = self.execute_batch(sql) {
            // Clear any transaction the failed script left open.
            if !self.is_autocommit() {
                let _ = self.execute_batch("ROLLBACK");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn read_state(&mut self) -> Result<Vec<MigrationRecord>, Error> {
        if !table_exists(self, STATE_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.prepare("SELECT name, time, who FROM migration_state ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(name, time, who)| {
                Ok(MigrationRecord {
                    name,
                    time: parse_time(&time)?,
                    who,
                })
            })
            .collect()
    }

    fn read_log(&mut self) -> Result<Vec<MigrationLogRecord>, Error> {
        if !table_exists(self, LOG_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt =
            self.prepare("SELECT id, time, name, op, who FROM migration_log ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, time, name, op, who)| {
                Ok(MigrationLogRecord {
                    id,
                    time: parse_time(&time)?,
                    name,
                    op: LogOp::parse(&op)?,
                    who,
                })
            })
            .collect()
    }

    fn record_applied(&mut self, name: &str) -> Result<(), Error> {
        self.execute("INSERT INTO migration_state (name) VALUES (?1)", [name])?;
        Ok(())
    }
}
