//! Reading migration catalogs from disk, and scaffolding new migration stubs.
//!
//! A migrations directory contains one subdirectory per migration, named
//! `<number>_<label>` with a zero-padded number of at least five digits (or a
//! `YYYYMMDDhhmmss` timestamp). Inside each subdirectory, every `*.sql` file
//! whose name contains `forward` forms one statement of the forward script,
//! concatenated in lexicographic filename order; likewise for `backward`.
//! Splitting a script across `01_forward.sql`, `02_forward.sql`, ... is how a
//! migration becomes a multi-statement sequence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::Error;
use crate::migration::Migration;

const LEADING_DIGITS: usize = 5;
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Forward script of the initial migration. Creates the `migration_state`
/// stack, the `migration_log` audit table, and the trigger that copies every
/// state insert and delete into the log, then records itself.
const INIT_FORWARD_TMPL: &str = "\
BEGIN;
CREATE TABLE migration_state (
    name TEXT NOT NULL,
    time TIMESTAMP WITH TIME ZONE DEFAULT now() NOT NULL,
    who TEXT DEFAULT CURRENT_USER NOT NULL,
    PRIMARY KEY (name)
);

CREATE TABLE migration_log (
    id SERIAL NOT NULL,
    time TIMESTAMP WITH TIME ZONE DEFAULT now() NOT NULL,
    name TEXT NOT NULL,
    op TEXT NOT NULL,
    who TEXT DEFAULT CURRENT_USER NOT NULL,
    PRIMARY KEY (id)
);

CREATE FUNCTION record_migration() RETURNS trigger AS $$
BEGIN
    IF (TG_OP = 'DELETE') THEN
        INSERT INTO migration_log (name, op) VALUES (OLD.name, TG_OP);
        RETURN OLD;
    END IF;
    INSERT INTO migration_log (name, op) VALUES (NEW.name, TG_OP);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER record_migration AFTER INSERT OR DELETE ON migration_state
    FOR EACH ROW EXECUTE PROCEDURE record_migration();

INSERT INTO migration_state (name) VALUES ('{name}');
COMMIT;
";

/// Backward script of the initial migration: refuses to run. The initial
/// migration is non-reversible; dropping the state and log tables would erase
/// the audit trail along with the ledger.
const INIT_BACKWARD_TMPL: &str = "\
BEGIN;
DO $$
BEGIN
    RAISE 'it is not possible to migrate backward past the initial migration ({name})';
END;
$$ LANGUAGE plpgsql;
COMMIT;
";

const FORWARD_TMPL: &str = "\
BEGIN;
SELECT 1 / 0; -- Delete this line and replace it with the SQL that migrates forward.
INSERT INTO migration_state (name) VALUES ('{name}');
COMMIT;
";

const BACKWARD_TMPL: &str = "\
BEGIN;
SELECT 1 / 0; -- Delete this line and replace it with the SQL that migrates backward.
DELETE FROM migration_state WHERE name = '{name}';
COMMIT;
";

fn migration_name_pattern() -> Regex {
    Regex::new(&format!(r"^[0-9]{{{LEADING_DIGITS},}}_.+$")).expect("static pattern is valid")
}

/// Read all migrations in `dir`, in ascending name order.
pub fn read_migration_files(dir: &Path) -> Result<Vec<Migration>, Error> {
    migration_directory_names(dir)?
        .into_iter()
        .map(|name| read_migration(dir, name))
        .collect()
}

/// List the subdirectories of `dir` that look like migrations, sorted
/// ascending.
fn migration_directory_names(dir: &Path) -> Result<Vec<String>, Error> {
    let pattern = migration_name_pattern();
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if pattern.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn read_migration(dir: &Path, name: String) -> Result<Migration, Error> {
    let folder = dir.join(&name);
    let forward = read_scripts(&folder, "forward")?;
    let backward = read_scripts(&folder, "backward")?;
    if forward.is_empty() {
        return Err(Error::Catalog(format!(
            "migration '{name}' has no *forward*.sql files"
        )));
    }
    if backward.is_empty() {
        return Err(Error::Catalog(format!(
            "migration '{name}' has no *backward*.sql files"
        )));
    }
    Ok(Migration {
        name,
        forward,
        backward,
    })
}

/// Read every `*.sql` file in `folder` whose name contains `marker`, sorted by
/// filename so that numbered parts concatenate in the intended order.
fn read_scripts(folder: &Path, marker: &str) -> Result<Vec<String>, Error> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.ends_with(".sql") && file_name.contains(marker) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    paths
        .iter()
        .map(|path| fs::read_to_string(path).map_err(Error::from))
        .collect()
}

/// Create the `00001_init` migration in `dir`. Its forward script sets up the
/// `migration_state` and `migration_log` tables; its backward script refuses
/// to run.
pub fn init_migration(dir: &Path) -> Result<PathBuf, Error> {
    let name = stub_name(1, "init");
    write_init_stubs(dir, &name)
}

/// Like [`init_migration`], but with a `YYYYMMDDhhmmss` prefix taken from
/// `timestamp` instead of `00001`.
pub fn init_migration_timestamp(dir: &Path, timestamp: DateTime<Utc>) -> Result<PathBuf, Error> {
    let name = format!("{}_init", timestamp.format(TIMESTAMP_FORMAT));
    write_init_stubs(dir, &name)
}

/// Create a new (non-initial) migration named `<next>_<label>`, where `next`
/// is one past the highest existing migration number in `dir`. The stubs fail
/// loudly until edited, and already contain their own state insert and delete.
pub fn new_migration(dir: &Path, label: &str) -> Result<PathBuf, Error> {
    let names = migration_directory_names(dir)?;
    let name = stub_name(latest_number(&names)? + 1, label);
    write_stubs(
        dir,
        &name,
        &fill(FORWARD_TMPL, &name),
        &fill(BACKWARD_TMPL, &name),
    )
}

/// Like [`new_migration`], but with a `YYYYMMDDhhmmss` prefix taken from
/// `timestamp` instead of the incrementing counter.
pub fn new_migration_timestamp(
    dir: &Path,
    label: &str,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, Error> {
    let name = format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), label);
    write_stubs(
        dir,
        &name,
        &fill(FORWARD_TMPL, &name),
        &fill(BACKWARD_TMPL, &name),
    )
}

fn write_init_stubs(dir: &Path, name: &str) -> Result<PathBuf, Error> {
    write_stubs(
        dir,
        name,
        &fill(INIT_FORWARD_TMPL, name),
        &fill(INIT_BACKWARD_TMPL, name),
    )
}

fn fill(template: &str, name: &str) -> String {
    template.replace("{name}", name)
}

fn stub_name(number: u64, label: &str) -> String {
    format!("{number:0width$}_{label}", width = LEADING_DIGITS)
}

fn latest_number(names: &[String]) -> Result<u64, Error> {
    let last = match names.last() {
        Some(last) => last,
        None => return Ok(0),
    };
    let prefix = last.split('_').next().unwrap_or_default();
    prefix.parse().map_err(|_| {
        Error::Catalog(format!(
            "migration directory '{last}' has a non-numeric prefix"
        ))
    })
}

fn write_stubs(
    dir: &Path,
    name: &str,
    forward_sql: &str,
    backward_sql: &str,
) -> Result<PathBuf, Error> {
    let folder = dir.join(name);
    fs::create_dir(&folder)?;
    fs::write(folder.join("forward.sql"), forward_sql)?;
    fs::write(folder.join("backward.sql"), backward_sql)?;
    Ok(folder)
}
