use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::chunk::audit;
use crate::chunk::config::load_config;
use crate::chunk::evaluator::{ChunkPolicyEvaluator, PlanEvaluator};
use crate::chunk::naming::new_generator;
use crate::chunk::paths::{ChunkPaths, resolve_paths};
use crate::chunk::reconcile::{ReconcileOutcome, execute};
use crate::chunk::registry::Registry;
use crate::chunk::rewrite::HrefRewriter;
use crate::chunk::uri::WorkDir;
use crate::commands::CommandReport;
use crate::error::ChunkError;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub plan: PathBuf,
    pub temp_dir: Option<PathBuf>,
    pub transtype: Option<String>,
}

/// Exclusive advisory lock on the working root, released on drop.
struct RunLock {
    file: File,
}

impl RunLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.try_lock_exclusive()
            .map_err(|_| ChunkError::Locked(path.display().to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn describe(outcome: &ReconcileOutcome, report: &mut CommandReport) {
    if outcome.skipped {
        report.detail("no relocations in change table; reconciliation skipped");
        return;
    }
    report.detail(format!("deleted_files={}", outcome.deleted_files));
    report.detail(format!("moved_files={}", outcome.moved_files));
    report.detail(format!("conflicts_dropped={}", outcome.conflicts_dropped));
    report.detail(format!("records_removed={}", outcome.records_removed));
    report.detail(format!("records_upserted={}", outcome.records_upserted));
    report.detail(format!(
        "rewritten_files={} unchanged_files={} missing_files={}",
        outcome.rewritten_files, outcome.unchanged_files, outcome.missing_files
    ));
    for (uri, prefix) in &outcome.path_fixes {
        report.detail(format!("path_fix {uri} prefix={prefix}"));
    }
    for failure in &outcome.failures {
        report.issue(failure.to_string());
    }
}

fn audit_run(paths: &ChunkPaths, outcome: &ReconcileOutcome) -> CommandReport {
    let mut report = CommandReport::new("audit");
    let status = if outcome.skipped {
        "skipped"
    } else if outcome.is_clean() {
        "ok"
    } else {
        "degraded"
    };
    let message = format!(
        "deleted={} moved={} rewritten={} failures={}",
        outcome.deleted_files,
        outcome.moved_files,
        outcome.rewritten_files,
        outcome.failures.len()
    );
    if let Err(err) = audit::append_event(paths, "reconcile", status, &message) {
        report.issue(format!("audit log append failed: {err:#}"));
    }
    report
}

pub fn run(opts: &ReconcileOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("reconcile");

    let mut cfg = load_config()?;
    if let Some(transtype) = opts.transtype.as_deref() {
        cfg.reconcile.transtype = transtype.to_string();
    }
    let paths = resolve_paths(opts.temp_dir.as_deref(), &cfg.registry.file_name)?;
    if !paths.work_dir.is_dir() {
        anyhow::bail!("working directory {} does not exist", paths.work_dir.display());
    }
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    report.detail(format!("transtype={}", cfg.reconcile.transtype));

    let _lock = RunLock::acquire(&paths.lock_file)?;

    let work_dir = WorkDir::new(&paths.work_dir);
    let mut registry = Registry::load(&paths.registry_file)?;
    let generator = new_generator(cfg.reconcile.id_scheme());
    let mut evaluator = PlanEvaluator::load(&opts.plan, &work_dir, generator)?;
    let mut rewriter = HrefRewriter::new(work_dir.clone());

    let outcome = execute(
        &cfg.reconcile,
        &work_dir,
        &mut registry,
        &mut evaluator,
        &mut rewriter,
    )?;

    report.detail(format!(
        "maps_read={} operations={} navigation_support={}",
        evaluator.maps_read().len(),
        evaluator.chunk_operations().len(),
        evaluator.navigation_support()
    ));
    if let Some(root) = evaluator.root_chunk_override() {
        report.detail(format!("root_chunk_override={root}"));
    }
    describe(&outcome, &mut report);
    report.merge(audit_run(&paths, &outcome));
    Ok(report)
}
