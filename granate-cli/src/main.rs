//! The `granate` binary: create and run granate SQL migrations.
//!
//! Everything interactive lives here - argument parsing, the y/n
//! confirmation prompt, connection-string handling, and table rendering. The
//! library receives an open connection and an approve predicate and does the
//! rest.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use granate::postgres::{NoTls, PostgresClient};
use granate::store::MigrationStore;
use granate::{embed, files, Direction, Migration, Migrator};
use url::Url;

#[derive(Parser)]
#[command(name = "granate", version, about = "Create and run granate SQL migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DirArg {
    /// Migrations directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

#[derive(Args)]
struct DbArg {
    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    dburl: String,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    dir: DirArg,
    #[command(flatten)]
    db: DbArg,
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the initial migration
    Init {
        #[command(flatten)]
        dir: DirArg,
        /// Use a timestamp for the number part of the migration name
        #[arg(long)]
        ts: bool,
    },
    /// Create a new (not initial) migration with the given label
    New {
        label: String,
        #[command(flatten)]
        dir: DirArg,
        /// Use a timestamp for the number part of the migration name
        #[arg(long)]
        ts: bool,
    },
    /// Write the .sql migrations to a Rust source file
    Embed {
        #[command(flatten)]
        dir: DirArg,
        /// Filename to be written, inside the migrations directory
        #[arg(long, default_value = "catalog.rs")]
        file: String,
    },
    /// Migrate forward to the latest migration
    Forward(RunArgs),
    /// Migrate forward to the named migration
    ForwardTo {
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Record forward migrations up to the named one without running them
    FakeForwardTo {
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Migrate backward to the named migration, inclusive
    BackwardTo {
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show the migration state
    State {
        #[command(flatten)]
        db: DbArg,
    },
    /// Show the migration audit log
    Log {
        #[command(flatten)]
        db: DbArg,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Init { dir, ts } => {
            let folder = if ts {
                files::init_migration_timestamp(&dir.dir, Utc::now())?
            } else {
                files::init_migration(&dir.dir)?
            };
            println!("Migration stubs written to {}", folder.display());
        }
        Commands::New { label, dir, ts } => {
            if label.is_empty() {
                bail!("empty migration label not permitted");
            }
            let folder = if ts {
                files::new_migration_timestamp(&dir.dir, &label, Utc::now())?
            } else {
                files::new_migration(&dir.dir, &label)?
            };
            println!("Migration stubs written to {}", folder.display());
        }
        Commands::Embed { dir, file } => {
            let path = embed::write_catalog_module(&dir.dir, &file)?;
            println!("Catalog written to {}", path.display());
        }
        Commands::Forward(run) => {
            migrate(&run, "", Mode::Forward)?;
        }
        Commands::ForwardTo { name, run } => {
            migrate(&run, &name, Mode::Forward)?;
        }
        Commands::FakeForwardTo { name, run } => {
            migrate(&run, &name, Mode::FakeForward)?;
        }
        Commands::BackwardTo { name, run } => {
            migrate(&run, &name, Mode::Backward)?;
        }
        Commands::State { db } => {
            let mut client = connect(&db.dburl)?;
            let state = client.read_state()?;
            let rows: Vec<Vec<String>> = state
                .into_iter()
                .map(|r| vec![r.name, r.time.to_rfc3339(), r.who])
                .collect();
            print_table(&["NAME", "WHEN", "WHO"], &rows);
        }
        Commands::Log { db } => {
            let mut client = connect(&db.dburl)?;
            let log = client.read_log()?;
            let rows: Vec<Vec<String>> = log
                .into_iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.time.to_rfc3339(),
                        r.name,
                        r.op.to_string(),
                        r.who,
                    ]
                })
                .collect();
            print_table(&["ID", "TIME", "NAME", "OP", "WHO"], &rows);
        }
    }
    Ok(())
}

enum Mode {
    Forward,
    FakeForward,
    Backward,
}

fn migrate(run: &RunArgs, target: &str, mode: Mode) -> anyhow::Result<()> {
    let catalog = files::read_migration_files(&run.dir.dir)
        .with_context(|| format!("could not read migrations from {}", run.dir.dir.display()))?;
    let verb = match mode {
        Mode::FakeForward => "Faking",
        _ => "Running",
    };
    let migrator = Migrator::try_new(catalog)?
        .on_migration_start(move |name| {
            print!("{verb} {name}... ");
            let _ = io::stdout().flush();
        })
        .on_migration_complete(|_, elapsed| println!("ok ({elapsed:.1?})"))
        .on_migration_error(|_, _| println!("failed"));
    let mut client = connect(&run.db.dburl)?;
    let approve = confirm(run.yes);

    let ran = match mode {
        Mode::Forward => migrator.forward_to(&mut client, target, approve)?,
        Mode::FakeForward => migrator.fake_forward_to(&mut client, target, approve)?,
        Mode::Backward => migrator.backward_to(&mut client, target, approve)?,
    };
    if ran.is_empty() {
        println!("No migrations to run");
    } else {
        println!("Done");
    }
    Ok(())
}

/// Open a client, printing the database name and host first so the operator
/// can check they are pointed at the right place.
fn connect(dburl: &str) -> anyhow::Result<PostgresClient> {
    if dburl.is_empty() {
        bail!("empty database url provided");
    }
    let url = Url::parse(dburl).context("invalid database url")?;
    println!(
        "Connecting to database '{}' on host '{}'",
        url.path().trim_start_matches('/'),
        url.host_str().unwrap_or("")
    );
    Ok(PostgresClient::connect(dburl, NoTls)?)
}

/// Build the approve predicate: list the batch and ask for y/n, unless `--yes`
/// was given.
fn confirm(assume_yes: bool) -> impl Fn(&[&Migration], Direction) -> bool {
    move |batch, direction| {
        if assume_yes {
            return true;
        }
        let names: Vec<&str> = batch.iter().map(|m| m.name.as_str()).collect();
        println!("{} migrations that will be run:", heading(direction));
        println!("{}", names.join("\n"));
        print!("Run these migrations? (y/n) ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim() == "y"
    }
}

fn heading(direction: Direction) -> &'static str {
    match direction {
        Direction::Forward => "Forward",
        Direction::Backward => "Backward",
    }
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect();
        println!("{}", padded.join(" | "));
    };
    line(headers.to_vec());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
}
