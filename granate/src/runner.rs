use std::time::Instant;

use crate::error::Error;
use crate::migration::{validate, Direction, Migration, MigrationLogRecord, MigrationRecord};
use crate::plan;
use crate::store::MigrationStore;

type StartHook = Box<dyn Fn(&str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&str, std::time::Duration) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, &Error) + Send + Sync>;

/// The entrypoint for running a catalog of [Migration]s against a store.
///
/// Construct this struct with the full ordered catalog. Names must be unique
/// and ascending, and every script non-empty; `try_new` rejects anything else.
///
/// Execution is strictly sequential: migrations never run concurrently,
/// because later migrations may assume schema state left by earlier ones. A
/// batch runs to completion or to its first failure; on failure the
/// already-run prefix stays committed and nothing is compensated. Recovering a
/// migration left in an unknown state is an explicit operator action.
pub struct Migrator {
    catalog: Vec<Migration>,
    on_migration_start: Option<StartHook>,
    on_migration_complete: Option<CompleteHook>,
    on_migration_error: Option<ErrorHook>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("catalog", &self.catalog.iter().map(|m| &m.name).collect::<Vec<_>>())
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}

impl Migrator {
    /// Create a new Migrator, validating catalog invariants.
    /// Returns an error if the catalog is invalid.
    pub fn try_new(catalog: Vec<Migration>) -> Result<Self, Error> {
        validate(&catalog)?;
        Ok(Self {
            catalog,
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_error: None,
        })
    }

    /// Create a new Migrator, panicking if the catalog is invalid.
    /// For a non-panicking version, use `try_new`.
    pub fn new(catalog: Vec<Migration>) -> Self {
        match Self::try_new(catalog) {
            Ok(migrator) => migrator,
            Err(err) => panic!("{}", err),
        }
    }

    /// Set a callback to be invoked when a migration starts.
    /// The callback receives the migration name.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration completes successfully.
    /// The callback receives the migration name and duration.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, std::time::Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    /// The callback receives the migration name and error.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.on_migration_error = Some(Box::new(callback));
        self
    }

    /// Get a reference to the full migration catalog, in application order.
    pub fn catalog(&self) -> &[Migration] {
        &self.catalog
    }

    /// Read the stack of currently-applied migrations. Empty if the state
    /// table does not exist yet.
    pub fn state<S: MigrationStore>(&self, store: &mut S) -> Result<Vec<MigrationRecord>, Error> {
        store.read_state()
    }

    /// Read the append-only audit log. Empty if the log table does not exist.
    pub fn log<S: MigrationStore>(&self, store: &mut S) -> Result<Vec<MigrationLogRecord>, Error> {
        store.read_log()
    }

    /// Preview which migrations `forward_to` would run, without executing
    /// anything.
    pub fn preview_forward<S: MigrationStore>(
        &self,
        store: &mut S,
        target: &str,
    ) -> Result<Vec<&Migration>, Error> {
        let state = store.read_state()?;
        plan::forward_batch(&state, &self.catalog, target)
    }

    /// Preview which migrations `backward_to` would run, without executing
    /// anything.
    pub fn preview_backward<S: MigrationStore>(
        &self,
        store: &mut S,
        target: &str,
    ) -> Result<Vec<&Migration>, Error> {
        let state = store.read_state()?;
        plan::backward_batch(&state, &self.catalog, target)
    }

    /// Run every forward migration that has not yet been applied.
    pub fn forward<S, F>(&self, store: &mut S, approve: F) -> Result<Vec<String>, Error>
    where
        S: MigrationStore,
        F: Fn(&[&Migration], Direction) -> bool,
    {
        self.forward_to(store, "", approve)
    }

    /// Run forward migrations up to and including `target`. An empty `target`
    /// means "migrate to latest". Returns the names that ran; an empty vec
    /// means there was nothing to do (including a `target` that was already
    /// applied).
    ///
    /// `approve` is consulted once with the computed batch before anything
    /// runs; declining yields [`Error::Cancelled`] and no execution.
    pub fn forward_to<S, F>(
        &self,
        store: &mut S,
        target: &str,
        approve: F,
    ) -> Result<Vec<String>, Error>
    where
        S: MigrationStore,
        F: Fn(&[&Migration], Direction) -> bool,
    {
        let state = store.read_state()?;
        let batch = plan::forward_batch(&state, &self.catalog, target)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if !approve(&batch, Direction::Forward) {
            return Err(Error::Cancelled);
        }
        self.run_batch(store, &batch, Direction::Forward)
    }

    /// Run backward migrations from the most recently applied down to and
    /// including `target`.
    pub fn backward_to<S, F>(
        &self,
        store: &mut S,
        target: &str,
        approve: F,
    ) -> Result<Vec<String>, Error>
    where
        S: MigrationStore,
        F: Fn(&[&Migration], Direction) -> bool,
    {
        let state = store.read_state()?;
        let batch = plan::backward_batch(&state, &self.catalog, target)?;
        if !approve(&batch, Direction::Backward) {
            return Err(Error::Cancelled);
        }
        self.run_batch(store, &batch, Direction::Backward)
    }

    /// Record forward migrations up to and including `target` in the state
    /// table without running their forward scripts. Batch computation,
    /// ordering, and target resolution are identical to [`Self::forward_to`];
    /// only the execution differs. Used to adopt schema state that already
    /// exists in the database.
    pub fn fake_forward_to<S, F>(
        &self,
        store: &mut S,
        target: &str,
        approve: F,
    ) -> Result<Vec<String>, Error>
    where
        S: MigrationStore,
        F: Fn(&[&Migration], Direction) -> bool,
    {
        let state = store.read_state()?;
        let batch = plan::forward_batch(&state, &self.catalog, target)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if !approve(&batch, Direction::Forward) {
            return Err(Error::Cancelled);
        }

        let mut recorded = Vec::with_capacity(batch.len());
        for migration in batch {
            #[cfg(feature = "tracing")]
            tracing::info!(name = %migration.name, "Stamping migration without running it");

            if let Some(ref callback) = self.on_migration_start {
                callback(&migration.name);
            }
            let started = Instant::now();
            if let Err(source) = store.record_applied(&migration.name) {
                let err = Error::Execution {
                    name: migration.name.clone(),
                    source: Box::new(source),
                };
                if let Some(ref callback) = self.on_migration_error {
                    callback(&migration.name, &err);
                }
                return Err(err);
            }
            if let Some(ref callback) = self.on_migration_complete {
                callback(&migration.name, started.elapsed());
            }
            recorded.push(migration.name.clone());
        }
        Ok(recorded)
    }

    /// Execute one migration's statements for the given direction, in order.
    /// The first failing statement aborts the rest of this migration's script.
    fn run_one<S: MigrationStore>(
        &self,
        store: &mut S,
        migration: &Migration,
        direction: Direction,
    ) -> Result<(), Error> {
        let statements = match direction {
            Direction::Forward => &migration.forward,
            Direction::Backward => &migration.backward,
        };
        for statement in statements {
            if let Err(source) = store.run_script(statement) {
                return Err(Error::Execution {
                    name: migration.name.clone(),
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }

    /// Run a batch in its given order, halting on the first error. The
    /// already-run prefix stays committed; the remainder is never attempted.
    fn run_batch<S: MigrationStore>(
        &self,
        store: &mut S,
        batch: &[&Migration],
        direction: Direction,
    ) -> Result<Vec<String>, Error> {
        let mut ran = Vec::with_capacity(batch.len());
        for migration in batch {
            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!(
                "migration",
                name = %migration.name,
                direction = %direction
            )
            .entered();

            if let Some(ref callback) = self.on_migration_start {
                callback(&migration.name);
            }
            let started = Instant::now();

            match self.run_one(store, migration, direction) {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(elapsed = ?started.elapsed(), "Migration succeeded");

                    if let Some(ref callback) = self.on_migration_complete {
                        callback(&migration.name, started.elapsed());
                    }
                    ran.push(migration.name.clone());
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %err, "Migration failed; halting batch");

                    if let Some(ref callback) = self.on_migration_error {
                        callback(&migration.name, &err);
                    }
                    return Err(err);
                }
            }
        }
        Ok(ran)
    }
}
