use crate::chunk::failure::{FailureKind, FileFailure};
use crate::chunk::fsops;
use crate::chunk::reconcile::ReconcileOutcome;
use crate::chunk::reconcile_registry::RetainedSets;
use crate::chunk::registry::Registry;
use crate::chunk::tables::{ChangeTable, ConflictTable, RelativePathFix, identity_entries};
use crate::chunk::uri::{DocUri, WorkDir};
use tracing::debug;

/// Directory prefix to record when a move lands in a different directory.
pub fn path_fix_prefix(source: &DocUri, target: &DocUri) -> Option<String> {
    let prefix = target.dir_prefix();
    if prefix.is_empty() || prefix == source.dir_prefix() {
        return None;
    }
    Some(prefix.to_string())
}

/// Hand bookkeeping to conflict targets an earlier run already moved into
/// place, so the obsolete-file sweep leaves them alone.
pub fn carry_settled(
    work_dir: &WorkDir,
    change_table: &ChangeTable,
    conflict_table: &ConflictTable,
    sets: RetainedSets,
) -> RetainedSets {
    let mut sets = sets;
    for original in identity_entries(change_table) {
        let Some(target) = conflict_table.get(original).map(DocUri::resolved) else {
            continue;
        };
        let source = original.resolved();
        if work_dir.path_of(&target).exists() && !work_dir.path_of(&source).exists() {
            debug!("{source} was already moved to {target}");
            sets = sets.relocated(&source, &target);
        }
    }
    sets
}

/// Settle every identity entry that collides with another file.
///
/// A pending conflict (target absent on disk) replaces the target with the
/// chunk file, unregisters the source and hands its bookkeeping to the
/// target. The source record is kept when the move fails. A conflict whose
/// target already exists was settled before and is only dropped.
pub fn settle_conflicts(
    work_dir: &WorkDir,
    registry: &mut Registry,
    change_table: &ChangeTable,
    conflict_table: &mut ConflictTable,
    sets: RetainedSets,
    outcome: &mut ReconcileOutcome,
) -> (RetainedSets, RelativePathFix) {
    let mut sets = sets;
    let mut path_fix = RelativePathFix::new();

    for original in identity_entries(change_table) {
        let Some(target) = conflict_table.get(original).map(DocUri::resolved) else {
            continue;
        };
        let source = original.resolved();
        let source_path = work_dir.path_of(&source);
        let target_path = work_dir.path_of(&target);

        if target_path.exists() {
            debug!("drop settled conflict {source} -> {target}");
            conflict_table.remove(original);
            outcome.conflicts_dropped += 1;
            continue;
        }

        match fsops::replace_file(&source_path, &target_path) {
            Ok(()) => {
                outcome.moved_files += 1;
                if let Some(prefix) = path_fix_prefix(&source, &target) {
                    path_fix.insert(target.clone(), prefix);
                }
                if registry.remove(&source.strip_fragment()).is_some() {
                    debug!("unregister {source}");
                }
                sets = sets.relocated(&source, &target);
            }
            Err(err) => {
                outcome.record_failure(FileFailure::new(
                    FailureKind::Move,
                    source.as_str(),
                    &err.context(format!("failed to replace chunk topic {target}")),
                ));
                conflict_table.remove(original);
                outcome.conflicts_dropped += 1;
            }
        }
    }

    (sets, path_fix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::reconcile_registry::reconcile_registry;
    use crate::chunk::testing::{Fixture, table, uri};
    use std::collections::BTreeSet;

    fn run(
        fx: &mut Fixture,
        change: &ChangeTable,
        conflicts: &mut ConflictTable,
    ) -> (RelativePathFix, ReconcileOutcome) {
        let mut outcome = ReconcileOutcome::default();
        let fix = reconcile_registry(
            &fx.work_dir,
            &mut fx.registry,
            change,
            conflicts,
            &BTreeSet::new(),
            &mut outcome,
        );
        (fix, outcome)
    }

    #[test]
    fn prefix_only_when_directory_changes() {
        assert_eq!(
            path_fix_prefix(&uri("a/topic1.xml"), &uri("b/topic1.xml")),
            Some("b/".to_string())
        );
        assert_eq!(path_fix_prefix(&uri("b/x.xml"), &uri("b/y.xml")), None);
        assert_eq!(path_fix_prefix(&uri("a/x.xml"), &uri("y.xml")), None);
        assert_eq!(
            path_fix_prefix(&uri("x.xml"), &uri("c/d/x.xml")),
            Some("c/d/".to_string())
        );
    }

    #[test]
    fn pending_conflict_moves_file_and_swaps_registration() {
        let mut fx = Fixture::new();
        fx.map("root.ditamap", true);
        fx.topic("Told.xml", true);
        fx.write("Told.xml", "<topic id='told'/>");

        let change = table(&[("Told.xml", "Told.xml")]);
        let mut conflicts = table(&[("Told.xml", "Tnew.xml")]);
        let (fix, outcome) = run(&mut fx, &change, &mut conflicts);

        assert!(!fx.exists("Told.xml"));
        assert_eq!(fx.read("Tnew.xml"), "<topic id='told'/>");
        assert!(fx.record("Told.xml").is_none());
        let moved = fx.record("Tnew.xml").expect("Tnew registered");
        assert!(moved.is_topic());
        assert!(!moved.is_resource_only);
        assert_eq!(outcome.moved_files, 1);
        assert!(fix.is_empty());
        assert_eq!(conflicts.len(), 1);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn move_across_directories_records_path_fix() {
        let mut fx = Fixture::new();
        fx.topic("a/topic1.xml", false);
        fx.write("a/topic1.xml", "<topic/>");

        let change = table(&[("a/topic1.xml", "a/topic1.xml")]);
        let mut conflicts = table(&[("a/topic1.xml", "b/topic1.xml")]);
        let (fix, _) = run(&mut fx, &change, &mut conflicts);

        assert_eq!(fix.get(&uri("b/topic1.xml")).map(String::as_str), Some("b/"));
        assert!(fx.exists("b/topic1.xml"));
        assert!(fx.record("b/topic1.xml").expect("target").is_topic());
    }

    #[test]
    fn second_run_drops_settled_conflict() {
        let mut fx = Fixture::new();
        fx.topic("Told.xml", true);
        fx.write("Told.xml", "<topic/>");
        let change = table(&[("Told.xml", "Told.xml")]);

        let mut first = table(&[("Told.xml", "Tnew.xml")]);
        let (_, outcome) = run(&mut fx, &change, &mut first);
        assert_eq!(outcome.moved_files, 1);

        let mut second = table(&[("Told.xml", "Tnew.xml")]);
        let (fix, outcome) = run(&mut fx, &change, &mut second);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.moved_files, 0);
        assert_eq!(outcome.conflicts_dropped, 1);
        assert!(second.is_empty());
        assert!(fix.is_empty());
        assert!(fx.record("Tnew.xml").expect("still registered").is_topic());
        assert!(fx.record("Told.xml").is_none());
    }

    #[test]
    fn failed_move_keeps_source_record() {
        let mut fx = Fixture::new();
        fx.topic("a/ghost.xml", true);

        let change = table(&[("a/ghost.xml", "a/ghost.xml")]);
        let mut conflicts = table(&[("a/ghost.xml", "b/ghost.xml")]);
        let (fix, outcome) = run(&mut fx, &change, &mut conflicts);

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, FailureKind::Move);
        assert!(fx.record("a/ghost.xml").is_some());
        assert!(fx.record("b/ghost.xml").is_none());
        assert!(conflicts.is_empty());
        assert!(fix.is_empty());
    }
}
