//! Embedding a migration catalog into Rust source.
//!
//! Deployment artifacts often cannot ship a directory of `.sql` files. This
//! module reads a migrations directory and renders a standalone Rust module
//! exposing the same ordered catalog, so the binary can run migrations with no
//! filesystem access. The generated module only depends on the public
//! [`Migration`] type.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::files::read_migration_files;
use crate::migration::Migration;

/// Read the migrations in `dir` and write them as a Rust module named
/// `file_name` inside the same directory. Returns the path written.
pub fn write_catalog_module(dir: &Path, file_name: &str) -> Result<PathBuf, Error> {
    let catalog = read_migration_files(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, render_catalog_module(&catalog))?;
    Ok(path)
}

/// Render a catalog as Rust source. The module exposes
/// `pub fn catalog() -> Vec<Migration>` with the migrations in their
/// application order.
pub fn render_catalog_module(catalog: &[Migration]) -> String {
    let mut out = String::new();
    out.push_str("//! Migration catalog generated by `granate embed`. Do not edit by hand;\n");
    out.push_str("//! regenerate after changing the .sql files.\n\n");
    out.push_str("use granate::Migration;\n\n");
    out.push_str("/// Every known migration, in application order.\n");
    out.push_str("pub fn catalog() -> Vec<Migration> {\n");
    out.push_str("    vec![\n");
    for migration in catalog {
        out.push_str("        Migration {\n");
        out.push_str(&format!("            name: {:?}.to_string(),\n", migration.name));
        out.push_str("            forward: vec![\n");
        for script in &migration.forward {
            out.push_str(&format!("                {}.to_string(),\n", raw_literal(script)));
        }
        out.push_str("            ],\n");
        out.push_str("            backward: vec![\n");
        for script in &migration.backward {
            out.push_str(&format!("                {}.to_string(),\n", raw_literal(script)));
        }
        out.push_str("            ],\n");
        out.push_str("        },\n");
    }
    out.push_str("    ]\n");
    out.push_str("}\n");
    out
}

/// Quote `content` as a raw string literal, widening the `#` guard until no
/// closing sequence appears inside the content.
fn raw_literal(content: &str) -> String {
    let mut guard = 1;
    while content.contains(&format!("\"{}", "#".repeat(guard))) {
        guard += 1;
    }
    let hashes = "#".repeat(guard);
    format!("r{hashes}\"{content}\"{hashes}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::init_migration;

    #[test]
    fn rendered_module_lists_every_migration_in_order() {
        let catalog = vec![
            Migration::new(
                "00001_init",
                vec!["CREATE TABLE a (id INTEGER)".to_string()],
                vec!["DROP TABLE a".to_string()],
            ),
            Migration::new(
                "00002_b",
                vec!["CREATE TABLE b (id INTEGER)".to_string()],
                vec!["DROP TABLE b".to_string()],
            ),
        ];
        let source = render_catalog_module(&catalog);
        assert!(source.contains("pub fn catalog() -> Vec<Migration>"));
        let first = source.find("00001_init").unwrap();
        let second = source.find("00002_b").unwrap();
        assert!(first < second);
        assert!(source.contains(r###"r#"CREATE TABLE a (id INTEGER)"#"###));
    }

    #[test]
    fn sql_containing_raw_string_delimiters_is_guarded() {
        let catalog = vec![Migration::new(
            "00001_tricky",
            vec![r##"SELECT '"#'"##.to_string()],
            vec!["SELECT 1".to_string()],
        )];
        let source = render_catalog_module(&catalog);
        // The forward script contains `"#`, so the literal needs two hashes.
        assert!(source.contains(r###"r##"SELECT '"#'"##"###));
    }

    #[test]
    fn write_reads_the_directory_and_writes_beside_it() {
        let dir = tempfile::tempdir().unwrap();
        init_migration(dir.path()).unwrap();
        let path = write_catalog_module(dir.path(), "catalog.rs").unwrap();
        let source = fs::read_to_string(path).unwrap();
        assert!(source.contains("00001_init"));
        assert!(source.contains("CREATE TABLE migration_state"));
    }
}
