//! Helpers for building catalogs and states in tests.
//!
//! Available with the `testing` feature. These produce structurally valid
//! migrations with placeholder scripts, which is all reconciliation cares
//! about; tests that actually execute scripts should build real [`Migration`]s
//! instead.

use chrono::{TimeZone, Utc};

use crate::migration::{Migration, MigrationRecord};

/// A migration named `name` with trivial single-statement scripts.
pub fn named(name: &str) -> Migration {
    Migration {
        name: name.to_string(),
        forward: vec!["SELECT 1".to_string()],
        backward: vec!["SELECT 1".to_string()],
    }
}

/// A catalog of trivial migrations with the given names, in the given order.
pub fn catalog_of(names: &[&str]) -> Vec<Migration> {
    names.iter().map(|name| named(name)).collect()
}

/// An applied-migration state with the given names, in the given order, with
/// fixed timestamps and actor.
pub fn state_of(names: &[&str]) -> Vec<MigrationRecord> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| MigrationRecord {
            name: name.to_string(),
            time: base + chrono::Duration::seconds(i as i64),
            who: "test".to_string(),
        })
        .collect()
}
