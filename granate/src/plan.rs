//! Pure reconciliation between the recorded migration state and the catalog.
//!
//! Everything in this module is a pure function over snapshots: no I/O, no
//! mutation. Errors produced here are therefore side-effect-free and safe to
//! retry after the underlying mismatch is fixed. Ordering decisions are always
//! made on the migration name's string sort, never on applied-at timestamps,
//! so a batch is reproducible purely from the stored names.

use crate::error::Error;
use crate::migration::{Migration, MigrationRecord};

fn name_in_state(name: &str, state: &[MigrationRecord]) -> bool {
    state.iter().any(|record| record.name == name)
}

fn name_in_catalog(name: &str, catalog: &[&Migration]) -> bool {
    catalog.iter().any(|migration| migration.name == name)
}

/// Truncate `catalog` to the prefix ending at `tail`, inclusive.
fn trim_tail<'c>(tail: &str, catalog: &'c [Migration]) -> Result<&'c [Migration], Error> {
    for (i, migration) in catalog.iter().enumerate() {
        if migration.name == tail {
            return Ok(&catalog[..=i]);
        }
    }
    Err(Error::TargetNotFound {
        name: tail.to_string(),
    })
}

/// Verify that the recorded state is a prefix of the catalog, position by
/// position. Reported indexes are 1-based.
fn check_state_prefix(state: &[MigrationRecord], catalog: &[Migration]) -> Result<(), Error> {
    for (i, record) in state.iter().enumerate() {
        if record.name != catalog[i].name {
            return Err(Error::Divergence {
                index: i + 1,
                state_name: record.name.clone(),
                catalog_name: catalog[i].name.clone(),
            });
        }
    }
    Ok(())
}

/// Compute the ordered batch of migrations to run forward so that `target`
/// (or, for an empty `target`, the last catalog entry) ends up applied.
///
/// A `target` that is already applied yields an empty batch, not an error. Any
/// disagreement between state and catalog is reported as a structured error
/// before a batch is produced; the state being longer than the catalog is
/// reported as such regardless of content.
pub fn forward_batch<'c>(
    state: &[MigrationRecord],
    catalog: &'c [Migration],
    target: &str,
) -> Result<Vec<&'c Migration>, Error> {
    if catalog.is_empty() {
        return Err(Error::EmptyCatalog);
    }
    if state.len() > catalog.len() {
        return Err(Error::StateLongerThanCatalog {
            state: state.len(),
            catalog: catalog.len(),
        });
    }
    check_state_prefix(state, catalog)?;

    let target = if target.is_empty() {
        // "migrate to latest": catalog is non-empty here.
        catalog[catalog.len() - 1].name.as_str()
    } else {
        target
    };
    if name_in_state(target, state) {
        return Ok(Vec::new());
    }

    // The target is not applied, so it must be among the pending migrations;
    // anything else is a typo, even when there is nothing left to run.
    let pending: Vec<&Migration> = catalog[state.len()..].iter().collect();
    if !name_in_catalog(target, &pending) {
        return Err(Error::TargetNotFound {
            name: target.to_string(),
        });
    }

    let mut batch = Vec::new();
    for migration in pending {
        batch.push(migration);
        if migration.name == target {
            break;
        }
    }
    Ok(batch)
}

/// Compute the ordered batch of migrations to run backward, most recent first,
/// down to and including `target`.
///
/// The walk starts from the last applied migration and verifies at every step
/// that state and catalog still agree, so a divergence anywhere in the span
/// being reversed is reported before anything runs.
pub fn backward_batch<'c>(
    state: &[MigrationRecord],
    catalog: &'c [Migration],
    target: &str,
) -> Result<Vec<&'c Migration>, Error> {
    let latest = match state.last() {
        Some(record) => record.name.as_str(),
        None => return Err(Error::EmptyState),
    };
    let reversible = trim_tail(latest, catalog)?;
    if reversible.len() != state.len() {
        return Err(Error::StateCountMismatch {
            state: state.len(),
            reversible: reversible.len(),
            latest: latest.to_string(),
        });
    }

    let mut batch = Vec::new();
    for i in (0..state.len()).rev() {
        if state[i].name != reversible[i].name {
            return Err(Error::Divergence {
                index: i + 1,
                state_name: state[i].name.clone(),
                catalog_name: reversible[i].name.clone(),
            });
        }
        batch.push(&reversible[i]);
        if state[i].name == target {
            return Ok(batch);
        }
    }
    Err(Error::TargetNotFound {
        name: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog_of, state_of};

    fn names<'a>(batch: &'a [&'a Migration]) -> Vec<&'a str> {
        batch.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn forward_runs_everything_from_a_clean_state() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let batch = forward_batch(&[], &catalog, "").unwrap();
        assert_eq!(names(&batch), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn forward_runs_the_remainder_of_a_prefix() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let state = state_of(&["a", "b"]);
        let batch = forward_batch(&state, &catalog, "").unwrap();
        assert_eq!(names(&batch), vec!["c", "d"]);
    }

    #[test]
    fn forward_with_nothing_pending_is_empty() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let state = state_of(&["a", "b", "c", "d"]);
        let batch = forward_batch(&state, &catalog, "").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn forward_stops_at_the_requested_target() {
        let catalog = catalog_of(&["00001_init", "00002_foo", "00003_bar"]);
        let state = state_of(&["00001_init"]);
        let batch = forward_batch(&state, &catalog, "00003_bar").unwrap();
        assert_eq!(names(&batch), vec!["00002_foo", "00003_bar"]);
    }

    #[test]
    fn forward_to_an_already_applied_target_is_a_no_op() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a", "b"]);
        let batch = forward_batch(&state, &catalog, "b").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn forward_to_an_unknown_target_fails() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a"]);
        let err = forward_batch(&state, &catalog, "banana").unwrap_err();
        assert!(matches!(err, Error::TargetNotFound { name } if name == "banana"));
    }

    #[test]
    fn forward_to_an_unknown_target_fails_even_with_nothing_pending() {
        // A typo'd target must not be mistaken for "already up to date".
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a", "b", "c"]);
        let err = forward_batch(&state, &catalog, "banana").unwrap_err();
        assert!(matches!(err, Error::TargetNotFound { name } if name == "banana"));
    }

    #[test]
    fn forward_rejects_an_empty_catalog() {
        let err = forward_batch(&[], &[], "").unwrap_err();
        assert!(matches!(err, Error::EmptyCatalog));
    }

    #[test]
    fn state_longer_than_catalog_wins_over_any_content_check() {
        let catalog = catalog_of(&["a", "b"]);
        let state = state_of(&["x", "y", "z"]);
        let err = forward_batch(&state, &catalog, "").unwrap_err();
        assert!(matches!(
            err,
            Error::StateLongerThanCatalog {
                state: 3,
                catalog: 2
            }
        ));
    }

    #[test]
    fn forward_reports_divergence_at_the_first_mismatched_index() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let state = state_of(&["a", "b", "x"]);
        let err = forward_batch(&state, &catalog, "").unwrap_err();
        match err {
            Error::Divergence {
                index,
                state_name,
                catalog_name,
            } => {
                assert_eq!(index, 3);
                assert_eq!(state_name, "x");
                assert_eq!(catalog_name, "c");
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn divergence_is_detected_even_when_the_target_is_already_applied() {
        // The state diverges after the target; this must surface, not be
        // masked by the idempotent no-op.
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a", "x"]);
        let err = forward_batch(&state, &catalog, "a").unwrap_err();
        assert!(matches!(err, Error::Divergence { index: 2, .. }));
    }

    #[test]
    fn backward_reverses_the_whole_state() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a", "b", "c"]);
        let batch = backward_batch(&state, &catalog, "a").unwrap();
        assert_eq!(names(&batch), vec!["c", "b", "a"]);
    }

    #[test]
    fn backward_ignores_catalog_entries_newer_than_the_state() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let state = state_of(&["a", "b", "c"]);
        let batch = backward_batch(&state, &catalog, "a").unwrap();
        assert_eq!(names(&batch), vec!["c", "b", "a"]);
    }

    #[test]
    fn backward_stops_at_the_requested_target() {
        let catalog = catalog_of(&["00001_init", "00002_foo", "00003_bar"]);
        let state = state_of(&["00001_init", "00002_foo", "00003_bar"]);
        let batch = backward_batch(&state, &catalog, "00002_foo").unwrap();
        assert_eq!(names(&batch), vec!["00003_bar", "00002_foo"]);
    }

    #[test]
    fn backward_with_an_empty_state_fails() {
        let catalog = catalog_of(&["a", "b"]);
        let err = backward_batch(&[], &catalog, "a").unwrap_err();
        assert!(matches!(err, Error::EmptyState));
    }

    #[test]
    fn backward_to_a_name_not_applied_fails() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let state = state_of(&["a", "b", "c"]);
        let err = backward_batch(&state, &catalog, "d").unwrap_err();
        assert!(matches!(err, Error::TargetNotFound { name } if name == "d"));
    }

    #[test]
    fn backward_fails_when_the_latest_state_entry_is_not_in_the_catalog() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["a", "b", "c", "d"]);
        let err = backward_batch(&state, &catalog, "d").unwrap_err();
        assert!(matches!(err, Error::TargetNotFound { name } if name == "d"));
    }

    #[test]
    fn backward_reports_a_count_mismatch_with_both_lengths() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let state = state_of(&["banana", "a", "b", "c"]);
        let err = backward_batch(&state, &catalog, "a").unwrap_err();
        match err {
            Error::StateCountMismatch {
                state,
                reversible,
                latest,
            } => {
                assert_eq!(state, 4);
                assert_eq!(reversible, 3);
                assert_eq!(latest, "c");
            }
            other => panic!("expected count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn backward_reports_divergence_inside_the_reversed_span() {
        let catalog = catalog_of(&["a", "banana", "c"]);
        let state = state_of(&["a", "b", "c"]);
        let err = backward_batch(&state, &catalog, "a").unwrap_err();
        match err {
            Error::Divergence {
                index,
                state_name,
                catalog_name,
            } => {
                assert_eq!(index, 2);
                assert_eq!(state_name, "b");
                assert_eq!(catalog_name, "banana");
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn forward_then_backward_round_trips_to_empty() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let forward = forward_batch(&[], &catalog, "").unwrap();
        let applied: Vec<&str> = names(&forward);
        let state = state_of(&applied);
        let backward = backward_batch(&state, &catalog, applied[0]).unwrap();
        let mut reversed = names(&backward);
        reversed.reverse();
        assert_eq!(reversed, applied);
    }
}
