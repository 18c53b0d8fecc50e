/// Error type for the granate crate.
///
/// Reconciliation errors ([`StateLongerThanCatalog`](Error::StateLongerThanCatalog),
/// [`Divergence`](Error::Divergence), [`StateCountMismatch`](Error::StateCountMismatch),
/// [`TargetNotFound`](Error::TargetNotFound), [`EmptyState`](Error::EmptyState),
/// [`EmptyCatalog`](Error::EmptyCatalog)) are detected before any script runs, so they
/// are side-effect-free and safe to retry once the underlying mismatch is fixed.
/// [`Execution`](Error::Execution) means a batch stopped partway: the already-run
/// prefix stays committed and the remainder was never attempted.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The state table records more migrations than the catalog defines.
    #[error("migration state has {state} entries but the catalog only defines {catalog}")]
    StateLongerThanCatalog { state: usize, catalog: usize },

    /// The state and the catalog disagree at some position (1-based).
    #[error(
        "migration {index} from state ({state_name}) does not match name from catalog ({catalog_name})"
    )]
    Divergence {
        index: usize,
        state_name: String,
        catalog_name: String,
    },

    /// The state is deeper than the catalog prefix ending at its own latest entry.
    #[error(
        "state in database has {state} migrations, but the catalog defines {reversible} up to and including {latest}"
    )]
    StateCountMismatch {
        state: usize,
        reversible: usize,
        latest: String,
    },

    /// The requested target name is absent from the relevant candidate list.
    #[error("migration '{name}' not found")]
    TargetNotFound { name: String },

    /// Backward migration requested with nothing applied.
    #[error("migration state is empty; cannot migrate backward")]
    EmptyState,

    /// Forward migration requested against an empty catalog.
    #[error("no migrations in catalog")]
    EmptyCatalog,

    /// A statement failed while running a migration's script. The batch halts
    /// here; already-applied migrations stay applied.
    #[error("migration '{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The confirmation collaborator declined the batch.
    #[error("cancelled")]
    Cancelled,

    /// The catalog itself is malformed: duplicate or out-of-order names, or a
    /// migration with an empty script.
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// The audit log contained an operation other than INSERT or DELETE.
    #[error("unknown log op '{0}'")]
    UnknownLogOp(String),

    /// A stored timestamp could not be parsed.
    #[error("malformed timestamp in migration tables: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] ::postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
