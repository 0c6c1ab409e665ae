use crate::chunk::config::ReconcileSection;
use crate::chunk::eclipse;
use crate::chunk::evaluator::ChunkPolicyEvaluator;
use crate::chunk::failure::{self, FileFailure};
use crate::chunk::reconcile_registry::reconcile_registry;
use crate::chunk::registry::Registry;
use crate::chunk::rewrite::{ReferenceRewriter, rewrite_references};
use crate::chunk::tables::{ChangeTable, ChunkTopicSet, ConflictTable, RelativePathFix};
use crate::chunk::uri::WorkDir;
use crate::error::ChunkError;
use serde::Serialize;
use tracing::{debug, info};

pub const ECLIPSE_HELP_TRANSTYPE: &str = "eclipsehelp";

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    pub skipped: bool,
    pub deleted_files: usize,
    pub moved_files: usize,
    pub conflicts_dropped: usize,
    pub records_removed: usize,
    pub records_upserted: usize,
    pub rewritten_files: usize,
    pub unchanged_files: usize,
    pub missing_files: usize,
    pub path_fixes: RelativePathFix,
    pub failures: Vec<FileFailure>,
}

impl ReconcileOutcome {
    pub fn record_failure(&mut self, failure: FileFailure) {
        failure::emit(&failure);
        self.failures.push(failure);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Whether any change-table entry relocates its document.
pub fn has_changes(change_table: &ChangeTable) -> bool {
    change_table.iter().any(|(from, to)| from != to)
}

/// Apply a chunk run's tables to the registry, the working directory and the
/// references inside every registered document.
pub fn reconcile(
    work_dir: &WorkDir,
    registry: &mut Registry,
    rewriter: &mut dyn ReferenceRewriter,
    change_table: &ChangeTable,
    mut conflict_table: ConflictTable,
    chunk_topics: &ChunkTopicSet,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    if !has_changes(change_table) {
        debug!("no relocations in change table; skipping reconciliation");
        outcome.skipped = true;
        return outcome;
    }

    let path_fix = reconcile_registry(
        work_dir,
        registry,
        change_table,
        &mut conflict_table,
        chunk_topics,
        &mut outcome,
    );
    rewrite_references(
        work_dir,
        registry,
        rewriter,
        change_table,
        &conflict_table,
        &path_fix,
        &mut outcome,
    );
    outcome.path_fixes = path_fix;

    info!(
        deleted = outcome.deleted_files,
        moved = outcome.moved_files,
        rewritten = outcome.rewritten_files,
        failures = outcome.failures.len(),
        "reconciliation finished"
    );
    outcome
}

/// Feed the input maps to `evaluator`, then reconcile with the tables it
/// produced. Only setup problems are returned as errors.
pub fn execute(
    settings: &ReconcileSection,
    work_dir: &WorkDir,
    registry: &mut Registry,
    evaluator: &mut dyn ChunkPolicyEvaluator,
    rewriter: &mut dyn ReferenceRewriter,
) -> Result<ReconcileOutcome, ChunkError> {
    evaluator.set_navigation_support(settings.transtype == ECLIPSE_HELP_TRANSTYPE);
    evaluator.set_root_chunk_override(settings.root_chunk_override.as_deref());

    for map in eclipse::select_input_maps(registry, work_dir, &settings.transtype)? {
        evaluator.read(&map)?;
    }

    let change_table = evaluator.change_table().clone();
    let conflict_table = evaluator.conflict_table().clone();
    let chunk_topics = evaluator.chunk_topic_set().clone();
    debug!(
        operations = evaluator.chunk_operations().len(),
        changes = change_table.len(),
        conflicts = conflict_table.len(),
        "chunk plan evaluated"
    );

    Ok(reconcile(
        work_dir,
        registry,
        rewriter,
        &change_table,
        conflict_table,
        &chunk_topics,
    ))
}
