use chrono::{DateTime, Utc};

use crate::error::Error;

/// A single migration definition: a unique name plus the forward and backward
/// scripts that move the schema across it.
///
/// # Naming
///
/// Names take the form `<ordering-prefix>_<label>`, where the prefix is either
/// a zero-padded integer of at least five digits (`00001_init`) or a
/// `YYYYMMDDhhmmss` timestamp (`20240115093000_add_users`). Catalog order is
/// the ascending string sort of names, which must equal creation order: every
/// new migration gets a strictly greater prefix, and existing migrations are
/// never renamed or reordered once applied anywhere.
///
/// # Scripts
///
/// `forward` and `backward` are ordered, non-empty sequences of executable SQL
/// statements; a single-statement script is a sequence of length 1. Each
/// script is responsible for its own transactional boundaries and for the
/// matching insert into (or delete from) the `migration_state` table, so that
/// the schema change and the ledger update commit or fail together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub forward: Vec<String>,
    pub backward: Vec<String>,
}

impl Migration {
    pub fn new(
        name: impl Into<String>,
        forward: Vec<String>,
        backward: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            forward,
            backward,
        }
    }
}

/// One applied migration, as recorded in the `migration_state` table.
///
/// Read in ascending `name` order, the set of records forms a stack whose last
/// element is the most recently applied migration. Rows are inserted by each
/// forward script's own effect and deleted by the matching backward script.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub name: String,
    pub time: DateTime<Utc>,
    pub who: String,
}

/// The operation a `migration_log` entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOp {
    Insert,
    Delete,
}

impl LogOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogOp::Insert => "INSERT",
            LogOp::Delete => "DELETE",
        }
    }

    pub(crate) fn parse(op: &str) -> Result<Self, Error> {
        match op {
            "INSERT" => Ok(LogOp::Insert),
            "DELETE" => Ok(LogOp::Delete),
            other => Err(Error::UnknownLogOp(other.to_string())),
        }
    }
}

impl std::fmt::Display for LogOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only `migration_log` audit table, written by the
/// triggers the init migration installs on `migration_state`. The library only
/// ever reads this table.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationLogRecord {
    pub id: i32,
    pub time: DateTime<Utc>,
    pub name: String,
    pub op: LogOp,
    pub who: String,
}

/// The direction a batch of migrations runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check the catalog invariants: names strictly ascending (which also rules
/// out duplicates) and every script non-empty.
pub(crate) fn validate(catalog: &[Migration]) -> Result<(), Error> {
    for pair in catalog.windows(2) {
        if pair[0].name >= pair[1].name {
            return Err(Error::Catalog(format!(
                "migration '{}' must sort after '{}'; names must be unique and ascending",
                pair[1].name, pair[0].name
            )));
        }
    }
    for migration in catalog {
        if migration.forward.is_empty() {
            return Err(Error::Catalog(format!(
                "migration '{}' has an empty forward script",
                migration.name
            )));
        }
        if migration.backward.is_empty() {
            return Err(Error::Catalog(format!(
                "migration '{}' has an empty backward script",
                migration.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::catalog_of;

    #[test]
    fn ascending_catalog_is_valid() {
        let catalog = catalog_of(&["00001_init", "00002_users", "00010_indexes"]);
        assert!(validate(&catalog).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = catalog_of(&["00001_init", "00001_init"]);
        assert!(matches!(validate(&catalog), Err(Error::Catalog(_))));
    }

    #[test]
    fn out_of_order_names_are_rejected() {
        let catalog = catalog_of(&["00002_users", "00001_init"]);
        assert!(matches!(validate(&catalog), Err(Error::Catalog(_))));
    }

    #[test]
    fn empty_scripts_are_rejected() {
        let mut catalog = catalog_of(&["00001_init"]);
        catalog[0].backward.clear();
        assert!(matches!(validate(&catalog), Err(Error::Catalog(_))));
    }
}
