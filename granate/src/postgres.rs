//! PostgreSQL store backend, using the [`postgres`](https://crates.io/crates/postgres)
//! crate's synchronous client.
//!
//! The connection is handed to the engine already open; connection-string
//! handling stays with the caller. Scripts are executed as simple batches, so
//! a script's own `BEGIN`/`COMMIT` delimits its transaction and a failure
//! aborts the remainder of that script. After a failed script the
//! implementation issues a `ROLLBACK` so the connection is usable for the
//! state reads that follow; the database itself is left exactly as the failed
//! script's committed prefix left it.

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::migration::{LogOp, MigrationLogRecord, MigrationRecord};
use crate::store::{MigrationStore, LOG_TABLE, STATE_TABLE};

// Re-export connection types so callers don't need a direct dependency on the
// driver crate.
pub use ::postgres::Client as PostgresClient;
pub use ::postgres::NoTls;

fn table_exists(client: &mut ::postgres::Client, table: &str) -> Result<bool, Error> {
    let row = client.query_one(
        "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = 'public' AND tablename = $1)",
        &[&table],
    )?;
    Ok(row.get(0))
}

impl MigrationStore for ::postgres::Client {
    fn run_script(&mut self, sql: &str) -> Result<(), Error> {
        if let Err(err) = self.batch_execute(sql) {
            // Clear any transaction the failed script left open.
            let _ = self.batch_execute("ROLLBACK");
            return Err(err.into());
        }
        Ok(())
    }

    fn read_state(&mut self) -> Result<Vec<MigrationRecord>, Error> {
        if !table_exists(self, STATE_TABLE)? {
            return Ok(Vec::new());
        }
        let rows = self.query(
            "SELECT name, time, who FROM migration_state ORDER BY name",
            &[],
        )?;
        Ok(rows
            .into_iter()
            .map(|row| MigrationRecord {
                name: row.get(0),
                time: row.get::<_, DateTime<Utc>>(1),
                who: row.get(2),
            })
            .collect())
    }

    fn read_log(&mut self) -> Result<Vec<MigrationLogRecord>, Error> {
        if !table_exists(self, LOG_TABLE)? {
            return Ok(Vec::new());
        }
        let rows = self.query(
            "SELECT id, time, name, op, who FROM migration_log ORDER BY id",
            &[],
        )?;
        rows.into_iter()
            .map(|row| {
                let op: String = row.get(3);
                Ok(MigrationLogRecord {
                    id: row.get(0),
                    time: row.get::<_, DateTime<Utc>>(1),
                    name: row.get(2),
                    op: LogOp::parse(&op)?,
                    who: row.get(4),
                })
            })
            .collect()
    }

    fn record_applied(&mut self, name: &str) -> Result<(), Error> {
        self.execute("INSERT INTO migration_state (name) VALUES ($1)", &[&name])?;
        Ok(())
    }
}
